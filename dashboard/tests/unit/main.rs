mod fakes;
mod test_poller;
mod test_reconciler;
mod test_stages;
mod test_transitions;
