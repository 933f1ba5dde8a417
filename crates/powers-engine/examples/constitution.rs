//! Compile a small DAO constitution and walk one action through its
//! vote, printing the verdict at each step.
//!
//! Run with: cargo run --example constitution

use powers_core::{LawId, RoleId, VoteSupport};
use powers_engine::{
    compile, ChecksEvaluator, ConstitutionDoc, FixedClock, MemoryLedger,
};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let doc: ConstitutionDoc = serde_json::from_value(json!({
        "meta": { "name": "Demo DAO", "description": "two laws and a grant track" },
        "law_types": [
            { "name": "open_action", "address": "0xaaa1" },
            { "name": "vote_action", "address": "0xaaa2" },
            { "name": "grant_propose", "address": "0xbbb1" },
            { "name": "grant_allocate", "address": "0xbbb2" },
            { "name": "grant_end", "address": "0xbbb3" }
        ],
        "laws": [
            {
                "name": "Adopt roadmap",
                "law_type": "vote_action",
                "allowed_role": 1,
                "quorum": 50,
                "succeed_at": 51,
                "voting_period": 100
            },
            {
                "name": "Publish roadmap",
                "law_type": "open_action",
                "allowed_role": 1,
                "need_completed": { "relative": -1 }
            }
        ],
        "role_tracks": [
            {
                "role": 2,
                "allocator_role": 1,
                "label": "builder",
                "quorum": 40,
                "succeed_at": 51,
                "voting_period": 300
            }
        ]
    }))?;

    let graph = compile(doc)?;
    println!("compiled {} laws:", graph.len());
    for law in graph.iter() {
        println!("  {} {} ({})", law.index, law.name, law.law_type);
    }
    for cycle in graph.dependency_cycles() {
        println!("warning: dependency cycle: {cycle:?}");
    }

    let mut ledger = MemoryLedger::new(graph);
    for member in ["0xa", "0xb", "0xc", "0xd"] {
        ledger.grant_role(RoleId(1), member.into());
    }

    let adopt = LawId(1);
    let action = ledger.propose(adopt, "0xa".into(), b"roadmap-v1".to_vec(), 1, "2026 roadmap", 1000)?;
    for voter in ["0xa", "0xb", "0xc"] {
        ledger.cast_vote(voter.into(), action, VoteSupport::For, 1010)?;
    }

    for now in [1050u64, 1101] {
        let clock = FixedClock(now);
        let verdict = ChecksEvaluator::new(&ledger, &clock).evaluate(adopt, action, &"0xa".into())?;
        println!(
            "block {now}: state={} all_passed={} reasons={:?}",
            verdict.state,
            verdict.all_passed,
            verdict.reasons()
        );
    }

    Ok(())
}
