//! A small capture-and-log host built on `photon-scout`. Opens a capture
//! device, registers a handful of demo record types (party/loot/join
//! events), and prints every decoded record to stdout.
//!
//! To use it:
//!
//!     $ photon-scout-cli --interface eth0 --server ws://example.invalid:3000
//!
//! The `--server` address and `PARTY_WEBHOOK`/`LOOT_WEBHOOK` environment
//! variables are accepted and logged, but forwarding decoded events to a
//! websocket server or Discord webhook is not implemented here — this
//! binary only demonstrates registering records and listeners.

use anyhow::Context;
use clap::Parser;
use uuid::Uuid;

use photon_scout::capture::{open_capture, run_capture_loop};
use photon_scout::protocol::value::TypedValue;
use photon_scout::registry::RecordDescriptor;
use photon_scout::PhotonPipeline;

/// Watches traffic for a single Photon-speaking game server and logs every
/// decoded operation/event this host knows how to bind.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Network interface to capture from. Defaults to the interface on the
    /// local default route.
    #[arg(long, value_name = "NAME")]
    interface: Option<String>,

    /// Downstream server address. Accepted and logged only: forwarding
    /// decoded events to it is out of scope for this tool.
    #[arg(long, value_name = "URL")]
    server: Option<String>,
}

// Demo event/operation codes. The upstream enum table these were drawn from
// was not part of the source this crate was built from, so these are
// illustrative placeholders — swap in the real game's codes before relying
// on this binary for anything but the registration pattern it demonstrates.
mod demo_codes {
    pub const OP_JOIN_GAME: u8 = 2;
    pub const EVENT_PARTY_PLAYER_JOINED: u8 = 40;
    pub const EVENT_PARTY_JOINED: u8 = 41;
    pub const EVENT_PARTY_LEFT: u8 = 42;
    pub const EVENT_PARTY_LEADER_CHANGED: u8 = 43;
    pub const EVENT_PARTY_DISBANDED: u8 = 44;
}

#[derive(Debug, Default)]
struct OpJoinGame {
    character_id: Uuid,
    character_name: String,
    guild_id: Uuid,
    guild_name: String,
    alliance_name: String,
}

#[derive(Debug, Default)]
struct EvPartySinglePlayerJoined {
    player_uid: Uuid,
    player_name: String,
}

#[derive(Debug, Default)]
struct EvPartyJoined {
    party_leader: Uuid,
    players_uuid: Vec<Uuid>,
    player_usernames: Vec<String>,
}

#[derive(Debug, Default)]
struct EvPartyLeft {
    player_uid: Uuid,
}

#[derive(Debug, Default)]
struct EvPartyLeaderChanged {
    new_party_leader: Uuid,
}

#[derive(Debug, Default)]
struct EvPartyDisbanded;

fn string_list(value: &TypedValue) -> Option<Vec<String>> {
    match value {
        TypedValue::Array(_, items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_string().map(str::to_owned))
                .collect(),
        ),
        _ => None,
    }
}

fn register_demo_records(pipeline: &PhotonPipeline) {
    pipeline.registry().register_operation(
        demo_codes::OP_JOIN_GAME,
        RecordDescriptor::<OpJoinGame>::new()
            .character_id("character_id", [1], |r, v| r.character_id = v)
            .string("character_name", [2], None, |r, v| r.character_name = v)
            .character_id("guild_id", [53], |r, v| r.guild_id = v)
            .string("guild_name", [57], None, |r, v| r.guild_name = v)
            .string("alliance_name", [77], None, |r, v| r.alliance_name = v),
    );

    pipeline.registry().register_event(
        demo_codes::EVENT_PARTY_PLAYER_JOINED,
        RecordDescriptor::<EvPartySinglePlayerJoined>::new()
            .character_id("player_uid", [1], |r, v| r.player_uid = v)
            .string("player_name", [2], None, |r, v| r.player_name = v),
    );

    pipeline.registry().register_event(
        demo_codes::EVENT_PARTY_JOINED,
        RecordDescriptor::<EvPartyJoined>::new()
            .character_id("party_leader", [3], |r, v| r.party_leader = v)
            .character_id_list("players_uuid", [4], |r, v| r.players_uuid = v)
            .exact(
                "player_usernames",
                [5],
                "string list",
                string_list,
                |r, v| r.player_usernames = v,
            ),
    );

    pipeline.registry().register_event(
        demo_codes::EVENT_PARTY_LEFT,
        RecordDescriptor::<EvPartyLeft>::new().character_id("player_uid", [1], |r, v| {
            r.player_uid = v
        }),
    );

    pipeline.registry().register_event(
        demo_codes::EVENT_PARTY_LEADER_CHANGED,
        RecordDescriptor::<EvPartyLeaderChanged>::new().character_id(
            "new_party_leader",
            [1],
            |r, v| r.new_party_leader = v,
        ),
    );

    pipeline.registry().register_event(
        demo_codes::EVENT_PARTY_DISBANDED,
        RecordDescriptor::<EvPartyDisbanded>::new(),
    );

    pipeline.registry().register_listener(|record| {
        if let Some(r) = record.downcast_ref::<OpJoinGame>() {
            log::info!(
                "joined game: character={} ({}), guild={}, alliance={}",
                r.character_name,
                r.character_id,
                r.guild_name,
                r.alliance_name
            );
        } else if let Some(r) = record.downcast_ref::<EvPartySinglePlayerJoined>() {
            log::info!("party: {} ({}) joined", r.player_name, r.player_uid);
        } else if let Some(r) = record.downcast_ref::<EvPartyJoined>() {
            log::info!(
                "party roster: leader={}, members={:?}",
                r.party_leader,
                r.player_usernames
            );
        } else if let Some(r) = record.downcast_ref::<EvPartyLeft>() {
            log::info!("party: {} left", r.player_uid);
        } else if let Some(r) = record.downcast_ref::<EvPartyLeaderChanged>() {
            log::info!("party: new leader {}", r.new_party_leader);
        } else if record.downcast_ref::<EvPartyDisbanded>().is_some() {
            log::info!("party disbanded");
        }
    });

    pipeline
        .registry()
        .register_disconnect(|| log::warn!("disconnected"));
}

fn log_webhook_config(name: &str) {
    match std::env::var(name) {
        Ok(_) => log::info!("{} is configured", name),
        Err(_) => log::info!("{} is not set", name),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    log_webhook_config("PARTY_WEBHOOK");
    log_webhook_config("LOOT_WEBHOOK");
    if let Some(server) = &args.server {
        log::info!("configured downstream server: {}", server);
    }

    let pipeline = PhotonPipeline::new();
    register_demo_records(&pipeline);

    let mut capture =
        open_capture(args.interface.as_deref()).context("failed to open capture device")?;

    ctrlc::set_handler(|| {
        log::info!("received interrupt, shutting down");
        std::process::exit(0);
    })
    .context("failed to install Ctrl-C handler")?;

    let mut pipeline = pipeline;
    run_capture_loop(&mut capture, &mut pipeline).context("capture loop failed")?;

    Ok(())
}
