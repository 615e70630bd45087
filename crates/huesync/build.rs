use std::path::{Path, PathBuf};

use clap::CommandFactory;

// cli.rs only needs clap + clap_complete, both build-dependencies.
#[path = "src/cli.rs"]
mod cli;

fn main() -> std::io::Result<()> {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").map_or_else(|| PathBuf::from("target"), PathBuf::from);
    let man_dir = out_dir.join("man");
    std::fs::create_dir_all(&man_dir)?;

    write_pages(cli::Cli::command(), &man_dir)
}

/// One page per visible command, named `huesync-light-set.1` and so on.
fn write_pages(cmd: clap::Command, dir: &Path) -> std::io::Result<()> {
    let name = cmd.get_name().to_owned();
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd.clone()).render(&mut page)?;
    std::fs::write(dir.join(format!("{name}.1")), page)?;

    for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
        let qualified = format!("{name}-{}", sub.get_name());
        write_pages(sub.clone().name(qualified), dir)?;
    }
    Ok(())
}
