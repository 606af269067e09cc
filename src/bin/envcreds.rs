fn main() -> color_eyre::Result<()> {
    envcreds::cli::main()
}
