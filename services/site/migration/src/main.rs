use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(inkwell_site_migration::Migrator).await;
}
