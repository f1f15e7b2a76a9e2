//! Fuzz target for room admission against the reference model
//!
//! # Strategy
//!
//! - Operation sequences: selections, joins, auto-joins and policy flips
//!   interleaved with rooms loading, closing and reloading
//! - Flushes at arbitrary points, so inputs pile up between evaluations
//!
//! # Invariants
//!
//! - After every flush the session and the model agree on the room we are
//!   in, whether the room loaded and the joined-room history
//! - A closed room never admits a listener
//! - NEVER panic on any operation order

#![no_main]

use jam_harness::{JamWorld, ModelWorld, Operation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u64, Vec<Operation>)| {
    let (seed, ops) = input;
    let mut model = ModelWorld::new();
    let mut real = JamWorld::new(seed);

    for op in ops.iter().take(256).chain([&Operation::Flush]) {
        model.apply(op);
        real.apply(op);
        if *op != Operation::Flush {
            continue;
        }

        let expected = model.observable_state();
        assert_eq!(real.observable_state(), expected, "diverged after {op:?}");

        let state = real.jam().state();
        if let Some(room) = state.room.as_ref().filter(|_| state.in_room.is_some()) {
            assert!(!room.closed || state.i_am_moderator, "closed room admitted a listener");
        }
    }
});
