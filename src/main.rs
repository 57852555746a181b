use anyhow::Context;

fn main() -> anyhow::Result<()> {
    retext::run().context("retext failed")
}
