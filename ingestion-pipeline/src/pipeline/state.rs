use state_machines::state_machine;

state_machine! {
    name: IndexingMachine,
    state: IndexingState,
    initial: Received,
    states: [Received, BlobStored, Registered, Submitted, Indexed, Failed],
    events {
        store_blob { transition: { from: Received, to: BlobStored } }
        register { transition: { from: BlobStored, to: Registered } }
        submit { transition: { from: Registered, to: Submitted } }
        index { transition: { from: Submitted, to: Indexed } }
        abort {
            transition: { from: Received, to: Failed }
            transition: { from: BlobStored, to: Failed }
            transition: { from: Registered, to: Failed }
            transition: { from: Submitted, to: Failed }
            transition: { from: Indexed, to: Failed }
        }
    }
}

pub fn received() -> IndexingMachine<(), Received> {
    IndexingMachine::new(())
}
