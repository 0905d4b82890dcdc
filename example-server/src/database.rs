use axum_sql_sandbox::{Sandbox, SqliteSession};

/// Shop schema loaded when no schema file is configured
pub const DEMO_SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    is_active BOOLEAN DEFAULT true
);

CREATE TABLE products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price REAL NOT NULL,
    stock INTEGER DEFAULT 0,
    category TEXT
);

CREATE TABLE orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    product_id INTEGER NOT NULL REFERENCES products(id),
    quantity INTEGER NOT NULL,
    total REAL NOT NULL,
    status TEXT DEFAULT 'pending',
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX orders_by_user ON orders (user_id);
"#;

/// Fill the demo schema with sample rows
pub async fn seed(sandbox: &Sandbox<SqliteSession>) -> axum_sql_sandbox::Result<()> {
    let first_names = [
        "Alice", "Bob", "Charlie", "Diana", "Evan", "Fiona", "George", "Hannah", "Isaac", "Julia",
    ];
    let last_names = [
        "Johnson", "Smith", "Brown", "Prince", "Davis", "Wilson", "Taylor", "Anderson",
    ];

    let users: Vec<String> = (0..40)
        .map(|index| {
            let first = first_names[index % first_names.len()];
            let last = last_names[index % last_names.len()];
            format!(
                "('{first} {last}', '{}.{}{index}@example.com', {})",
                first.to_lowercase(),
                last.to_lowercase(),
                index % 5 != 0
            )
        })
        .collect();
    sandbox
        .run_query(&format!(
            "INSERT INTO users (name, email, is_active) VALUES {}",
            users.join(", ")
        ))
        .await?;

    let categories = ["Electronics", "Furniture", "Stationery", "Books", "Kitchen"];
    let product_types = ["Laptop", "Chair", "Notebook", "Lamp", "Kettle", "Monitor"];

    let products: Vec<String> = (0..30)
        .map(|index| {
            let price = 5.99 + (index as f64 * 12.5);
            format!(
                "('{} {}', {price:.2}, {}, '{}')",
                product_types[index % product_types.len()],
                index + 1,
                (index * 7 + 5) % 50,
                categories[index % categories.len()]
            )
        })
        .collect();
    sandbox
        .run_query(&format!(
            "INSERT INTO products (name, price, stock, category) VALUES {}",
            products.join(", ")
        ))
        .await?;

    let statuses = ["pending", "processing", "shipped", "completed", "cancelled"];

    let orders: Vec<String> = (0..120)
        .map(|index| {
            let product_id = (index % 30) + 1;
            let quantity = (index % 4) + 1;
            let total = quantity as f64 * (5.99 + (product_id - 1) as f64 * 12.5);
            format!(
                "({}, {product_id}, {quantity}, {total:.2}, '{}')",
                (index % 40) + 1,
                statuses[index % statuses.len()]
            )
        })
        .collect();
    sandbox
        .run_query(&format!(
            "INSERT INTO orders (user_id, product_id, quantity, total, status) VALUES {}",
            orders.join(", ")
        ))
        .await?;

    tracing::info!(
        users = users.len(),
        products = products.len(),
        orders = orders.len(),
        "sample data seeded"
    );
    Ok(())
}
