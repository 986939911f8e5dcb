mod intermittent;
mod notifier;
