//! `cargo run -p migration -- up` applies the `linked` table schema to `DATABASE_URL`.

use migration::Migrator;

#[tokio::main]
async fn main() {
    sea_orm_migration::cli::run_cli(Migrator).await;
}
