//! Play a short scripted session: a reward, an ambush and a fight.
//!
//! Run with: `cargo run -p dnd-engine --example scripted_session`

use dnd_engine::testing::ScriptedNarrator;
use dnd_engine::{create_sample_fighter, CombatStatus, EngineConfig, GameSession, RetryPolicy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::default()
        .with_seed(1)
        .with_retry_policy(RetryPolicy::immediate(2));
    let mut session = GameSession::new(create_sample_fighter("Thorin"), config);

    let narrator = ScriptedNarrator::new(vec![
        Ok("The innkeeper slides you a pouch. [ITEM: coin_purse] [RECRUIT: brom]".to_string()),
        Ok("On the road, goblins spring out! [COMBAT: 2 goblin; ambushed]".to_string()),
    ]);

    for input in ["I ask about work", "We head for the hills"] {
        println!("> {input}");
        let outcome = session.take_turn(&narrator, input).await?;
        println!("{}", outcome.narration);
        if !outcome.rewards.is_empty() {
            println!("{}", outcome.rewards.summary());
        }
        for turn in &outcome.combat {
            println!("{}", turn.report.narrative());
        }
    }

    while session.combat_status() == CombatStatus::Active {
        let target = session
            .encounter()
            .and_then(|e| e.living_enemies().first().map(|c| c.name.clone()))
            .unwrap_or_default();
        println!("> attack {target}");
        let turn = session.attack(&target)?;
        println!("{}", turn.report.narrative());
        if let Some(spoils) = turn.spoils {
            println!("Victory: +{} XP, +{} gold", spoils.xp, spoils.gold);
        }
    }

    println!("{}", session.status_line());
    Ok(())
}
