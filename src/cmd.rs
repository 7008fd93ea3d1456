mod add;
mod check;
mod remove;

use crate::ctx::Commands;

pub fn init() -> Commands {
  let mut commands = Commands::new();
  commands.insert("add",    Box::new(add::Add));
  commands.insert("check",  Box::new(check::Check));
  commands.insert("remove", Box::new(remove::Remove));
  commands
}
