//! `image-warden mutate` command.

use clap::Args;
use image_warden_core::ControllerConfig;

use crate::controller::Controller;

#[derive(Args, Debug)]
pub struct MutateArgs {
    /// Image reference
    pub image: String,
}

pub fn execute(config: ControllerConfig, args: MutateArgs) -> anyhow::Result<()> {
    let controller = Controller::open(&config)?;
    let (mutated, rules) = controller.mutate(&args.image);

    if rules.is_empty() {
        println!("'{}' unchanged", args.image);
    } else {
        println!("'{}' mutated to '{}' by rules {:?}", args.image, mutated, rules);
    }
    Ok(())
}
