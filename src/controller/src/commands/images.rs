//! `image-warden images` command.

use clap::Args;
use image_warden_core::ControllerConfig;
use image_warden_repo::Node;

use crate::output;

#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Only show this node
    #[arg(long)]
    pub node: Option<String>,

    /// Include silent nodes and images missing from the last report
    #[arg(short, long)]
    pub all: bool,

    /// Also show image filesystem usage
    #[arg(long)]
    pub filesystems: bool,

    /// Print nodes with their reports as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(config: ControllerConfig, args: ImagesArgs) -> anyhow::Result<()> {
    let repo = super::open_repo(&config)?;
    let nodes = repo.get_report_for_node(args.node.as_deref().unwrap_or(""), args.all)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    println!("{}", images_table(&nodes, args.all));
    if args.filesystems {
        println!();
        println!("{}", filesystems_table(&nodes));
    }
    Ok(())
}

fn images_table(nodes: &[Node], all: bool) -> comfy_table::Table {
    let mut headers = vec!["NODE", "IMAGE ID", "TAG", "DIGEST", "SIZE", "REPORTED"];
    if all {
        headers.push("LAST REPORT");
    }

    let mut table = output::new_table(&headers);
    for node in nodes {
        for image in &node.images {
            let mut row = vec![
                node.info.nodename.clone(),
                output::short_digest(&image.id),
                image.repo_tag.clone(),
                output::short_digest(&image.repo_digest),
                output::format_bytes(image.size),
                output::format_ago(&image.reported_at),
            ];
            if all {
                row.push(if image.seen_in_last_report { "yes" } else { "no" }.to_string());
            }
            table.add_row(row);
        }
    }
    table
}

fn filesystems_table(nodes: &[Node]) -> comfy_table::Table {
    let mut table = output::new_table(&["NODE", "MOUNTPOINT", "USED", "INODES", "SAMPLED"]);
    for node in nodes {
        for fs in &node.image_filesystems {
            table.add_row(vec![
                node.info.nodename.clone(),
                fs.mountpoint.clone(),
                output::format_bytes(fs.used_bytes),
                fs.inodes_used.to_string(),
                output::format_ago(&fs.timestamp),
            ]);
        }
    }
    table
}
