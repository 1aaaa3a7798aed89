use anyhow::Result;

use binrun::app;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
