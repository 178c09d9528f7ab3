use anyhow::Result;

use crate::state::CliState;

pub async fn help(state: &mut CliState, _args: &[String]) -> Result<()> {
    print!("{}", state.help);
    Ok(())
}

pub async fn quit(state: &mut CliState, _args: &[String]) -> Result<()> {
    state.done = true;
    Ok(())
}
