fn main() -> anyhow::Result<()> {
    roadmap::run()?;
    Ok(())
}
