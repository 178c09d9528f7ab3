use anyhow::Result;

use crate::state::CliState;

pub async fn df(state: &mut CliState, _args: &[String]) -> Result<()> {
    let stat = state.cwd.fsstat(&state.cred).await?;
    println!(
        "{:>12} {:>12} {:>12} {:>10} {:>10}",
        "total", "free", "avail", "files", "ffree"
    );
    println!(
        "{:>12} {:>12} {:>12} {:>10} {:>10}",
        human(stat.total_space),
        human(stat.free_space),
        human(stat.avail_space),
        stat.total_files,
        stat.free_files
    );
    Ok(())
}

fn human(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 10_240 && unit < UNITS.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    format!("{}{}", value, UNITS[unit])
}
