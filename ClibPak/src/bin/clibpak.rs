fn main() -> anyhow::Result<()> {
    clibpak::cli::run_cli()
}
