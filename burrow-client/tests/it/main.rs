mod consume;
mod helper;
mod queue;
