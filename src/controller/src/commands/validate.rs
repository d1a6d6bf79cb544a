//! `image-warden validate` command.

use clap::Args;
use image_warden_core::ControllerConfig;

use crate::controller::Controller;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Image reference
    pub image: String,
}

pub async fn execute(config: ControllerConfig, args: ValidateArgs) -> anyhow::Result<()> {
    let controller = Controller::open(&config)?;
    let (allowed, rule) = controller.validate(&args.image).await;

    if allowed {
        println!("'{}' is valid (rule '{}')", args.image, rule);
    } else {
        println!("'{}' rejected by rule '{}'", args.image, rule);
    }
    Ok(())
}
