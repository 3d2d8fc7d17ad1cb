//! Typed events carried on the bus
//!
//! An event is (topic, monotonic timestamp, payload). Payloads are a fixed
//! set of record types; events are immutable once published. Topic names
//! are stable strings declared in [`topic`].

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

/// Stable topic names. The bus itself is topic-agnostic; these are the
/// names the scheduler and the built-in services publish on.
pub mod topic {
    pub const VISION_EVENTS: &str = "vision/events";
    pub const AUDIO_EVENTS: &str = "audio/events";
    pub const MOTOR_STATE: &str = "motor/state";
    pub const COG_QUERY: &str = "cog/query";
    pub const COG_ANSWER: &str = "cog/answer";
    pub const FIELD_METRICS: &str = "field/metrics";
    pub const WM_CONTEXT: &str = "wm/context";
    pub const REFLECT_COMMAND: &str = "reflect/command";
    pub const SAFETY_EVENTS: &str = "safety/events";
}

/// Microseconds since the first call in this process, from a monotonic
/// clock. Never goes backwards; shared by every publisher.
pub fn monotonic_micros() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// One record on the bus. Stamped at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    /// Monotonic timestamp in microseconds (see [`monotonic_micros`]).
    pub timestamp_us: u64,
    pub payload: Payload,
}

/// The fixed set of payload record types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    VisionFrame(VisionFrame),
    AudioFrame(AudioFrame),
    MotorState(MotorState),
    CognitiveQuery(CognitiveQuery),
    CognitiveAnswer(CognitiveAnswer),
    FieldMetrics(FieldMetrics),
    WmContext(WmContext),
    ReflectCommand(ReflectCommand),
    SafetyEvent(SafetyEvent),
}

/// Detections from a vision frontend. Object ids are field node ids so the
/// attention service can inject activation directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionFrame {
    pub object_ids: Vec<NodeId>,
    pub embeddings: Vec<Vec<f32>>,
    pub bbox: [f32; 4],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioFrame {
    pub phonemes: Vec<String>,
    pub energy: f32,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub joint_pos: Vec<f32>,
    pub joint_vel: Vec<f32>,
    pub torque: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CognitiveQuery {
    pub text: String,
    pub embedding: Vec<f32>,
    pub intent_code: u32,
    /// Node ids the query grounds in, if the caller resolved any.
    pub node_ids: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CognitiveAnswer {
    pub text: String,
    pub reasoning_chain: Vec<String>,
    pub confidence: f32,
}

/// Point-in-time summary of the activation field. Published on
/// `field/metrics` every tick (phase 1).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FieldMetrics {
    pub active: usize,
    pub mean: f32,
    pub max: f32,
    pub var: f32,
    /// 1 − active / total_nodes, in [0, 1].
    pub sparsity: f32,
    /// Shannon entropy (base 2) of activations normalized to a
    /// probability distribution; 0 when the field sums to 0.
    pub entropy: f32,
    /// Share of total activation mass held by the top 10% of entries.
    pub coherence: f32,
    /// Most recent answer confidence at snapshot time.
    pub conf: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmContext {
    pub node_ids: Vec<NodeId>,
    pub strengths: Vec<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectCommand {
    pub mode_code: u8,
    pub beta: f32,
    pub theta: f32,
    pub strategy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub event_type: String,
    /// Severity in [0, 1].
    pub severity: f32,
    pub details: String,
}

impl Event {
    /// Stamp a payload for a topic with the current monotonic time.
    pub fn now(topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            topic: topic.into(),
            timestamp_us: monotonic_micros(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_micros_never_decreases() {
        let a = monotonic_micros();
        let b = monotonic_micros();
        assert!(b >= a);
    }

    #[test]
    fn test_event_stamping() {
        let before = monotonic_micros();
        let e = Event::now(topic::COG_QUERY, Payload::CognitiveQuery(Default::default()));
        assert_eq!(e.topic, "cog/query");
        assert!(e.timestamp_us >= before);
    }

    #[test]
    fn test_payload_serde_round_trip() {
        let e = Event::now(
            topic::SAFETY_EVENTS,
            Payload::SafetyEvent(SafetyEvent {
                event_type: "BACKPRESSURE_KWTA".to_string(),
                severity: 0.7,
                details: "field over budget".to_string(),
            }),
        );
        let json = serde_json::to_string(&e).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        match back.payload {
            Payload::SafetyEvent(s) => {
                assert_eq!(s.event_type, "BACKPRESSURE_KWTA");
                assert!((s.severity - 0.7).abs() < 1e-6);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
