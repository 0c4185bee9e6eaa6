fn main() -> anyhow::Result<()> {
    panelweb::cli::run_cli()
}
