use crate::error::{Result, SpendError};
use crate::server;
use crate::settings::load_settings;

pub fn run(addr: Option<String>) -> Result<()> {
    let mut settings = load_settings()?;
    if let Some(addr) = addr {
        settings.server_addr = addr;
    }
    std::fs::create_dir_all(settings.data_path())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(server::serve(settings))
        .map_err(|e| SpendError::Other(format!("server error: {e:#}")))
}
