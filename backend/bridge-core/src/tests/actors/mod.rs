mod connection;
mod daemon_events;
mod dns;
mod location;
mod queue;
