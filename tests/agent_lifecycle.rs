mod common;

use agent_chain::agent::{CharacterFormat, CharacterSheet};
use agent_chain::config::AgentChainConfig;
use agent_chain::context::AppContext;
use agent_chain::heartbeat::tasks;
use agent_chain::llm::TextGenerator;
use agent_chain::notify::RecordingNotifier;
use agent_chain::state::LocalStore;
use agent_chain::types::{ActionCategory, Agent, ChatMessage, ChatRole, TraitKind};
use common::*;
use std::sync::Arc;

struct World {
    ctx: AppContext,
    store: LocalStore,
    chain: Arc<FakeChain>,
    llm: Arc<CannedLlm>,
    notifier: Arc<RecordingNotifier>,
}

fn world_with(twitter: FakeTwitter, llm: Arc<dyn TextGenerator>, canned: Arc<CannedLlm>) -> World {
    let store = LocalStore::in_memory().unwrap();
    let chain = Arc::new(FakeChain::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = AppContext::assemble(
        AgentChainConfig::default(),
        store.database(),
        Arc::new(store.clone()),
        chain.clone(),
        notifier.clone(),
        llm,
        Arc::new(twitter),
    )
    .unwrap();
    World {
        ctx,
        store,
        chain,
        llm: canned,
        notifier,
    }
}

fn world(twitter: FakeTwitter) -> World {
    let llm = Arc::new(CannedLlm::default());
    world_with(twitter, llm.clone(), llm)
}

async fn seed_agent(w: &World, handle: &str) {
    w.ctx
        .store
        .insert_agent(&Agent {
            handle: handle.into(),
            display_name: Some("Satoshi".into()),
            bio: Some("Cypherpunk".into()),
            life_goals: "Sound money".into(),
            skills: "C++".into(),
            ..Agent::default()
        })
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[tokio::test]
async fn twitter_training_builds_agent_tweets_and_wallet() {
    let mut twitter = FakeTwitter::with_tweets("alice", 150);
    twitter.page_size = 50;
    let w = world(twitter);

    let trained = w.ctx.trainer.create_from_twitter("@Alice").await.unwrap();
    assert!(trained.created);
    assert_eq!(trained.agent.handle, "alice");
    assert_eq!(trained.agent.display_name.as_deref(), Some("Alice Builder"));
    assert_eq!(
        trained.agent.profile_picture.as_deref(),
        Some("https://pbs.twimg.com/p/a_400x400.jpg")
    );
    assert_eq!(trained.agent.life_goals, "output for agent-life-goals-generation");
    assert_eq!(trained.agent.skills, "output for agent-skills-generation");
    let context = trained.agent.life_context.unwrap();
    assert!(context.starts_with("output for agent-personality-generation\n\nSYSTEM PROMPT:\n"));
    assert!(context.contains("Additional personality insights:"));

    let requests = w.llm.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| (r.temperature - 0.2).abs() < f64::EPSILON));

    // Two pages of 50, capped at 92.
    let saved = w.store.database().lock().await.saved_tweets("alice", 500).unwrap();
    assert_eq!(saved.len(), 92);

    assert!(trained.wallet.is_some());
    assert!(w.ctx.store.get_wallet("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn twitter_training_reuses_existing_agent() {
    let w = world(FakeTwitter::with_tweets("alice", 10));
    w.ctx.trainer.create_from_twitter("alice").await.unwrap();
    let again = w.ctx.trainer.create_from_twitter("ALICE").await.unwrap();

    assert!(!again.created);
    assert_eq!(w.llm.requests().len(), 3);
}

#[tokio::test]
async fn twitter_training_without_tweets_fails_and_notifies() {
    let w = world(FakeTwitter::with_tweets("ghost", 0));
    assert!(w.ctx.trainer.create_from_twitter("ghost").await.is_err());
    assert!(w.ctx.store.get_agent("ghost").await.unwrap().is_none());
    assert!(w.notifier.messages().iter().any(|m| m.contains("ghost")));
}

#[tokio::test]
async fn llm_failure_aborts_training() {
    let canned = Arc::new(CannedLlm::default());
    let w = world_with(FakeTwitter::with_tweets("alice", 5), Arc::new(BrokenLlm), canned);
    let err = w.ctx.trainer.create_from_twitter("alice").await.unwrap_err();
    assert!(format!("{err:#}").contains("model overloaded"));
    assert!(w.ctx.store.get_wallet("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_updates_bio_and_avatar() {
    let mut twitter = FakeTwitter::with_tweets("satoshi", 3);
    twitter.user.description = Some("New bio".into());
    let w = world(twitter);
    seed_agent(&w, "satoshi").await;

    let agent = w.ctx.trainer.refresh("satoshi").await.unwrap();
    assert_eq!(agent.bio.as_deref(), Some("New bio"));
    assert_eq!(agent.profile_picture.as_deref(), Some("https://pbs.twimg.com/p/a_400x400.jpg"));
    assert_eq!(agent.skills, "C++");
}

#[tokio::test]
async fn character_training_creates_general_agent() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    let sheet = CharacterSheet::parse(
        "# Sherlock Holmes\n## Description\nDetective\n## Traits\n- Observant\n",
        CharacterFormat::Markdown,
    )
    .unwrap();
    let creator = "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    w.ctx.users.get_or_create(creator).await.unwrap();

    let trained = w
        .ctx
        .trainer
        .create_from_character(&sheet, None, Some(creator))
        .await
        .unwrap();
    assert_eq!(trained.agent.handle, "sherlock_holmes");
    assert_eq!(trained.agent.skills, "output for character-skills-generation");

    let general = w.ctx.store.get_general_agent("sherlock_holmes").await.unwrap().unwrap();
    assert_eq!(general.agent_type, "character");
    assert!(general.is_public);
    assert_eq!(general.traits, vec!["Observant"]);
    assert!(general
        .system_prompt
        .starts_with("You are an AI agent based on the character: Sherlock Holmes."));
    let avatar = general.profile_picture.unwrap();
    assert!(avatar.starts_with("/avatars/") && avatar.ends_with(".png"));

    assert!(w.ctx.users.has_agent(creator).await.unwrap());
    assert!(w.ctx.store.get_wallet("sherlock_holmes").await.unwrap().is_some());
}

#[tokio::test]
async fn character_cannot_take_over_existing_handle() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    seed_agent(&w, "satoshi").await;
    let sheet = CharacterSheet::parse("Satoshi\nA pseudonymous author.\n", CharacterFormat::Text).unwrap();

    for _ in 0..2 {
        let err = w
            .ctx
            .trainer
            .create_from_character(&sheet, None, None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("already belongs to another agent"));
    }

    assert!(w.ctx.store.get_general_agent("satoshi").await.unwrap().is_none());
    assert!(w.llm.requests().is_empty());
    let agent = w.ctx.store.get_agent("satoshi").await.unwrap().unwrap();
    assert_eq!(agent.skills, "C++");
}

// ---------------------------------------------------------------------------
// Actions, chat and evolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tweet_action_links_post_to_event() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    seed_agent(&w, "satoshi").await;

    let outcome = w.ctx.actions.execute_by_id("satoshi", "market-analysis").await.unwrap();
    assert_eq!(outcome.output, "output for market-analysis");
    assert_eq!(outcome.event.top_level_type, "trading");

    let tweet = outcome.tweet.unwrap();
    assert_eq!(tweet.action_id.as_deref(), Some(outcome.event.id.as_str()));
    assert_eq!(tweet.content, outcome.output);

    let request = &w.llm.requests()[0];
    assert!(request.system_prompt.as_deref().unwrap().contains("You are Satoshi (satoshi)."));

    let summaries = w.ctx.actions.recent_results("satoshi", 5).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].action_id, "market-analysis");
}

#[tokio::test]
async fn random_action_honors_category() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    seed_agent(&w, "satoshi").await;

    for _ in 0..5 {
        let outcome = w
            .ctx
            .actions
            .execute_random("satoshi", Some(ActionCategory::Learning))
            .await
            .unwrap();
        assert_eq!(outcome.template.category, ActionCategory::Learning);
    }
    assert_eq!(w.ctx.actions.recent_tweets("satoshi", 10).await.unwrap().len(), 5);
}

#[tokio::test]
async fn unknown_agent_or_action_is_an_error() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    seed_agent(&w, "satoshi").await;
    assert!(w.ctx.actions.execute_by_id("nobody", "generate-tweet").await.is_err());
    assert!(w.ctx.actions.execute_by_id("satoshi", "fly-to-mars").await.is_err());
}

#[tokio::test]
async fn chat_sends_history_and_new_message() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    seed_agent(&w, "satoshi").await;

    let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
    let reply = w.ctx.chat.reply("satoshi", &history, "what is bitcoin?").await.unwrap();
    assert_eq!(reply, "output for agent-chat");

    let request = &w.llm.requests()[0];
    assert!((request.temperature - 0.7).abs() < f64::EPSILON);
    assert_eq!(request.messages.len(), 3);
    assert_eq!(request.messages[2].role, ChatRole::User);
    assert_eq!(request.messages[2].content, "what is bitcoin?");
}

#[tokio::test]
async fn evolution_records_history_and_updates_agent() {
    let w = world(FakeTwitter::with_tweets("x", 0));
    seed_agent(&w, "satoshi").await;
    w.ctx.actions.execute_by_id("satoshi", "skill-improvement").await.unwrap();

    let update = w.ctx.evolver.evolve("satoshi", TraitKind::Skills).await.unwrap();
    assert_eq!(update.previous, "C++");
    assert_eq!(update.new, "output for agent-evolve-skills");
    assert!(update.summary_of_the_changes.contains("+ output for agent-evolve-skills"));

    let agent = w.ctx.store.get_agent("satoshi").await.unwrap().unwrap();
    assert_eq!(agent.skills, "output for agent-evolve-skills");

    let history = w.ctx.evolver.history("satoshi", TraitKind::Skills, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    let events = w.ctx.store.recent_action_events("satoshi", 10).await.unwrap();
    assert!(events.iter().any(|e| e.top_level_type == "evolution"
        && Some(e.id.as_str()) == history[0].action_id.as_deref()));

    let prompt = &w.llm.requests()[1].messages[0].content;
    assert!(prompt.contains("output for skill-improvement"));
}

// ---------------------------------------------------------------------------
// Heartbeat tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_tasks_drive_agents() {
    let w = world(FakeTwitter::with_tweets("x", 0));

    let skipped = tasks::execute_task("random_action", &serde_json::Value::Null, &w.ctx)
        .await
        .unwrap();
    assert!(skipped.starts_with("Skipped"));

    seed_agent(&w, "satoshi").await;
    let ran = tasks::execute_task("random_action", &serde_json::json!({"category": "creative"}), &w.ctx)
        .await
        .unwrap();
    assert!(ran.starts_with("satoshi ran creative-"));

    let pong = tasks::execute_task("heartbeat_ping", &serde_json::Value::Null, &w.ctx)
        .await
        .unwrap();
    assert_eq!(pong, "pong");
    assert!(w.ctx.db.lock().await.kv_get("last_heartbeat").unwrap().is_some());

    assert!(tasks::execute_task("mine_bitcoin", &serde_json::Value::Null, &w.ctx)
        .await
        .is_err());
    assert!(w.chain.calls().is_empty());
}
