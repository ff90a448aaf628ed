use super::super::args::*;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Purge(args) => super::purge::run(args).await,
        Command::Expand(args) => super::expand::run(args),
    }
}
