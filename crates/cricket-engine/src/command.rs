//! Graph mutations sent from control threads to the audio thread.
//!
//! A command carries its payload by value; anything the audio thread stops
//! using is handed back through the graph's disposal channel, so memory is
//! freed on a control thread.

use std::any::Any;

use crate::arena::{EffectId, NodeId};
use crate::effect::{EffectCommand, EffectSlot};
use crate::node::{BusCommand, Node, SourceCommand};
use crate::writer::AudioWriter;

/// One queued operation.
pub enum Command<T> {
    /// Places a new node in the graph (unconnected).
    InsertNode(NodeId, Node<T>),
    /// Removes a node. Removing a bus moves everything routed to it onto the
    /// master mix.
    RemoveNode(NodeId),
    /// Adds `input` to the front of a mix or bus input.
    AddInput {
        /// Mix or effect bus receiving the input.
        mix: NodeId,
        /// Node being added.
        input: NodeId,
    },
    /// Removes `input` from a mix or bus input.
    RemoveInput {
        /// Mix or effect bus losing the input.
        mix: NodeId,
        /// Node being removed.
        input: NodeId,
    },
    /// Operation on a source node.
    Source(NodeId, SourceCommand),
    /// Operation on an effect bus.
    Bus(NodeId, BusCommand),
    /// Stores a new effect slot.
    InsertEffect(EffectId, EffectSlot),
    /// Detaches and removes an effect.
    RemoveEffect(EffectId),
    /// Operation on an effect slot.
    Effect(EffectId, EffectCommand),
    /// Releases a value once every earlier command has been applied.
    Free(Box<dyn Any + Send>),
    /// Starts writing the output to `writer`, replacing any current capture.
    StartCapture(Box<dyn AudioWriter<T>>),
    /// Stops writing the output.
    StopCapture,
}

impl<T> std::fmt::Debug for Command<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::InsertNode(id, _) => f.debug_tuple("InsertNode").field(id).finish(),
            Command::RemoveNode(id) => f.debug_tuple("RemoveNode").field(id).finish(),
            Command::AddInput { mix, input } => f
                .debug_struct("AddInput")
                .field("mix", mix)
                .field("input", input)
                .finish(),
            Command::RemoveInput { mix, input } => f
                .debug_struct("RemoveInput")
                .field("mix", mix)
                .field("input", input)
                .finish(),
            Command::Source(id, cmd) => f.debug_tuple("Source").field(id).field(cmd).finish(),
            Command::Bus(id, cmd) => f.debug_tuple("Bus").field(id).field(cmd).finish(),
            Command::InsertEffect(id, _) => f.debug_tuple("InsertEffect").field(id).finish(),
            Command::RemoveEffect(id) => f.debug_tuple("RemoveEffect").field(id).finish(),
            Command::Effect(id, cmd) => f.debug_tuple("Effect").field(id).field(cmd).finish(),
            Command::Free(_) => f.write_str("Free"),
            Command::StartCapture(_) => f.write_str("StartCapture"),
            Command::StopCapture => f.write_str("StopCapture"),
        }
    }
}
