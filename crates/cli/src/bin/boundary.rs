use anyhow::Result;

fn main() -> Result<()> {
    boundary_cli::main_entry()
}
