mod session;
mod workflow;
