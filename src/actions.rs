//! Built-in rehabilitation actions.
//!
//! The planner names actions exactly as listed here; argument kinds must
//! match the planner's action definitions. Every action forwards to an
//! [`AvatarActions`] method so the speech, recording and vision integrations
//! stay outside the bridge.
//!
//! | Action                    | Signature | Collaborator call               |
//! |---------------------------|-----------|---------------------------------|
//! | `Text`                    | (String)  | `text`                          |
//! | `MoveToPos`               | (Vector)  | `move_to` on the avatar         |
//! | `Dialogue`                | (String)  | `dialogue`                      |
//! | `Speak`                   | (String)  | `speak`                         |
//! | `RecordVideoAndEvaluate`  | (String)  | `record_video_and_evaluate`     |
//! | `DisposeQueries`          | ()        | `dispose_queries`               |
//! | `StartRecording`          | ()        | `start_recording`               |
//! | `StopRecording`           | ()        | `stop_recording`                |
//! | `Done`                    | ()        | `done`                          |
//! | `Hide` / `Show`           | (String)  | `set_visible` on named entity   |
//! | `AskQuestion`             | (String)  | `ask_question`                  |
//! | `TakeSnapshot`            | (String)  | `take_snapshot`                 |
//! | `SendImageAndTextRequest` | (String)  | `send_image_and_text_request`   |

use crate::dispatch::{ActionContext, ActionRegistry, ArgKind, BoundArgs};
use crate::error::RegistryError;
use crate::registry::EntityHandle;
use crate::types::Vec3;
use log::{debug, info, warn};

/// Engine-side effects of planner actions.
///
/// Every method has a logging default so hosts only override what they
/// actually support.
pub trait AvatarActions {
    fn text(&mut self, text: &str) {
        info!("Planner text: {}", text);
    }

    fn move_to(&mut self, avatar: &EntityHandle, position: Vec3) {
        info!("Moving '{}' to {}", avatar.name, position);
    }

    fn dialogue(&mut self, trigger: &str) {
        debug!("Dialogue trigger '{}'", trigger);
    }

    fn speak(&mut self, text: &str) {
        info!("Speaking: {}", text);
    }

    fn record_video_and_evaluate(&mut self, instruction: &str) {
        info!("Recording and evaluating: {}", instruction);
    }

    fn dispose_queries(&mut self) {
        debug!("Disposing pending evaluation queries");
    }

    fn start_recording(&mut self) {
        debug!("Start recording");
    }

    fn stop_recording(&mut self) {
        debug!("Stop recording");
    }

    fn done(&mut self) {
        debug!("Planner action sequence done");
    }

    fn set_visible(&mut self, entity: &EntityHandle, visible: bool) {
        info!(
            "{} '{}'",
            if visible { "Show" } else { "Hide" },
            entity.name
        );
    }

    fn ask_question(&mut self, question: &str) {
        info!("Asking patient: {}", question);
    }

    fn take_snapshot(&mut self, image_id: &str) {
        debug!("Snapshot requested ({})", image_id);
    }

    fn send_image_and_text_request(&mut self, instruction: &str) {
        debug!("Image evaluation requested: {}", instruction);
    }
}

/// Host that accepts every action and only logs it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingActions;

impl AvatarActions for LoggingActions {}

// ---------------------------------------------------------------------------
// Default table
// ---------------------------------------------------------------------------

/// Build and validate the standard action table.
pub fn default_registry() -> Result<ActionRegistry, RegistryError> {
    ActionRegistry::builder()
        .action("Text", &[ArgKind::String], |ctx, args| {
            ctx.host.text(string_or_empty(args, 0));
        })
        .action("MoveToPos", &[ArgKind::Vector], |ctx, args| {
            match (ctx.avatar, args.vector(0)) {
                (Some(avatar), Some(pos)) => ctx.host.move_to(avatar, pos),
                (None, _) => warn!("MoveToPos: no avatar spawned"),
                (_, None) => warn!("MoveToPos: no target position supplied"),
            }
        })
        .action("Dialogue", &[ArgKind::String], |ctx, args| {
            ctx.host.dialogue(string_or_empty(args, 0));
        })
        .action("Speak", &[ArgKind::String], |ctx, args| {
            ctx.host.speak(string_or_empty(args, 0));
        })
        .action("RecordVideoAndEvaluate", &[ArgKind::String], |ctx, args| {
            ctx.host.record_video_and_evaluate(string_or_empty(args, 0));
        })
        .action("DisposeQueries", &[], |ctx, _| ctx.host.dispose_queries())
        .action("StartRecording", &[], |ctx, _| ctx.host.start_recording())
        .action("StopRecording", &[], |ctx, _| ctx.host.stop_recording())
        .action("Done", &[], |ctx, _| ctx.host.done())
        .action("Hide", &[ArgKind::String], |ctx, args| {
            set_visible(ctx, args, false)
        })
        .action("Show", &[ArgKind::String], |ctx, args| {
            set_visible(ctx, args, true)
        })
        .action("AskQuestion", &[ArgKind::String], |ctx, args| {
            ctx.host.ask_question(string_or_empty(args, 0));
        })
        .action("TakeSnapshot", &[ArgKind::String], |ctx, args| {
            ctx.host.take_snapshot(string_or_empty(args, 0));
        })
        .action("SendImageAndTextRequest", &[ArgKind::String], |ctx, args| {
            ctx.host.send_image_and_text_request(string_or_empty(args, 0));
        })
        .build()
}

fn string_or_empty(args: &BoundArgs, index: usize) -> &str {
    args.string(index).unwrap_or("")
}

fn set_visible(ctx: &mut ActionContext<'_>, args: &BoundArgs, visible: bool) {
    let Some(name) = args.string(0) else {
        warn!("Hide/Show: no object name supplied");
        return;
    };
    match ctx.entities.find_by_name(name) {
        Some(entity) => ctx.host.set_visible(&entity.handle, visible),
        None => debug!("Hide/Show: no entity named '{}'", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ActionArgs;
    use crate::dispatch::DispatchOutcome;
    use crate::registry::{EntityKind, EntityRegistry, Template};
    use crate::types::Pose;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl AvatarActions for Recorder {
        fn speak(&mut self, text: &str) {
            self.calls.push(format!("speak:{}", text));
        }

        fn move_to(&mut self, avatar: &EntityHandle, position: Vec3) {
            self.calls.push(format!("move:{}:{}", avatar.name, position));
        }

        fn set_visible(&mut self, entity: &EntityHandle, visible: bool) {
            self.calls.push(format!("visible:{}:{}", entity.name, visible));
        }
    }

    fn make_entities() -> EntityRegistry {
        let mut r = EntityRegistry::new(
            [
                Template::new("Avatar", EntityKind::Player),
                Template::new("Cup", EntityKind::Object),
            ]
            .into_iter()
            .collect(),
        );
        r.spawn("Avatar", Pose::default()).unwrap();
        r.spawn("Cup", Pose::default()).unwrap();
        r
    }

    fn run(name: &str, args: ActionArgs) -> (DispatchOutcome, Vec<String>) {
        let registry = default_registry().unwrap();
        let entities = make_entities();
        let mut host = Recorder::default();
        let outcome = {
            let mut ctx = ActionContext {
                avatar: entities.first_player(),
                entities: &entities,
                host: &mut host,
            };
            registry.dispatch(name, &args, &mut ctx)
        };
        (outcome, host.calls)
    }

    #[test]
    fn default_table_validates() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 14);
        assert_eq!(registry.signature("Done"), Some(&[][..]));
    }

    #[test]
    fn speak_forwards_text() {
        let (outcome, calls) = run(
            "Speak",
            ActionArgs {
                strings: vec!["lift your arm".into()],
                ..Default::default()
            },
        );
        assert!(outcome.is_invoked());
        assert_eq!(calls, ["speak:lift your arm"]);
    }

    #[test]
    fn move_targets_first_player() {
        let (_, calls) = run(
            "MoveToPos",
            ActionArgs {
                vectors: vec![Vec3::new(1.0, 0.0, 2.0)],
                ..Default::default()
            },
        );
        assert_eq!(calls, ["move:Avatar:(1.00, 0.00, 2.00)"]);
    }

    #[test]
    fn move_without_position_is_noop() {
        let (outcome, calls) = run("MoveToPos", ActionArgs::default());
        match outcome {
            DispatchOutcome::Invoked { missing, .. } => assert_eq!(missing, 1),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(calls.is_empty());
    }

    #[test]
    fn hide_resolves_entity_by_name() {
        let (_, calls) = run(
            "Hide",
            ActionArgs {
                strings: vec!["Cup".into()],
                ..Default::default()
            },
        );
        assert_eq!(calls, ["visible:Cup:false"]);

        let (_, calls) = run(
            "Show",
            ActionArgs {
                strings: vec!["Teapot".into()],
                ..Default::default()
            },
        );
        assert!(calls.is_empty());
    }

    #[test]
    fn unknown_action_is_reported_not_raised() {
        let (outcome, calls) = run("Juggle", ActionArgs::default());
        assert_eq!(
            outcome,
            DispatchOutcome::Unknown {
                action: "Juggle".into()
            }
        );
        assert!(calls.is_empty());
    }
}
