use tokio_postgres::Client;

pub async fn run_sql(client: &Client, sql: &str) -> anyhow::Result<()> {
    for stmt in sql.split(';') {
        let stmt = stmt.trim();
        if !stmt.is_empty() {
            client.batch_execute(stmt).await?;
        }
    }
    Ok(())
}

pub async fn init_label_tables(client: &Client) -> anyhow::Result<()> {
    let sql = include_str!("../../sql/init_labels.sql");
    run_sql(client, sql).await
}
