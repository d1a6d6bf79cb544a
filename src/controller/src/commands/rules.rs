//! `image-warden rules` command.

use image_warden_core::ControllerConfig;

use crate::controller::Controller;

pub fn execute(config: ControllerConfig) -> anyhow::Result<()> {
    let controller = Controller::open(&config)?;
    print!("{}", controller.rules_yaml()?);
    Ok(())
}
