use std::path::PathBuf;

use anyhow::Result;
use strata_forecast::config::Config;
use strata_forecast::utils::logging;
use strata_forecast::App;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（可选的第一个参数为 TOML 配置文件）
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
