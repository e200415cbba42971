fn main() -> anyhow::Result<()> {
    zipthumb::cli::run_cli()
}
