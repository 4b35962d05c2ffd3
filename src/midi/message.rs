use crate::types::events::MidiEvent;

/// MIDI channel messages the player cares about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ProgramChange { channel: u8, program: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Aftertouch, pitch bend and the like
    Other { channel: u8 },
    Unknown,
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a message
    /// Handles standard MIDI protocol: [status, data1, data2]
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return MidiMessage::Unknown;
        }

        let status = bytes[0];
        let message_type = status & 0xF0;
        let channel = status & 0x0F;

        match message_type {
            0x90 => {
                if bytes.len() >= 3 {
                    Self::note_on(channel, bytes[1], bytes[2])
                } else {
                    MidiMessage::Unknown
                }
            }
            0x80 => {
                if bytes.len() >= 3 {
                    MidiMessage::NoteOff {
                        channel,
                        note: bytes[1],
                        velocity: bytes[2],
                    }
                } else {
                    MidiMessage::Unknown
                }
            }
            0xC0 => {
                if bytes.len() >= 2 {
                    MidiMessage::ProgramChange {
                        channel,
                        program: bytes[1],
                    }
                } else {
                    MidiMessage::Unknown
                }
            }
            0xB0 => {
                if bytes.len() >= 3 {
                    MidiMessage::ControlChange {
                        channel,
                        controller: bytes[1],
                        value: bytes[2],
                    }
                } else {
                    MidiMessage::Unknown
                }
            }
            0xA0 | 0xE0 if bytes.len() >= 3 => MidiMessage::Other { channel },
            0xD0 if bytes.len() >= 2 => MidiMessage::Other { channel },
            _ => MidiMessage::Unknown,
        }
    }

    /// Convert a message decoded by `midly` (file tracks, live streams)
    pub fn from_midly(channel: u8, message: &midly::MidiMessage) -> Self {
        match *message {
            midly::MidiMessage::NoteOn { key, vel } => {
                Self::note_on(channel, key.as_int(), vel.as_int())
            }
            midly::MidiMessage::NoteOff { key, vel } => MidiMessage::NoteOff {
                channel,
                note: key.as_int(),
                velocity: vel.as_int(),
            },
            midly::MidiMessage::ProgramChange { program } => MidiMessage::ProgramChange {
                channel,
                program: program.as_int(),
            },
            midly::MidiMessage::Controller { controller, value } => MidiMessage::ControlChange {
                channel,
                controller: controller.as_int(),
                value: value.as_int(),
            },
            _ => MidiMessage::Other { channel },
        }
    }

    /// MIDI spec: Note On with velocity 0 is actually Note Off
    fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        if velocity == 0 {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity: 0,
            }
        } else {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            }
        }
    }

    /// Convert to a song event at tick `time`
    /// Returns None for anything that is not a channel message
    pub fn to_event(&self, time: u64) -> Option<MidiEvent> {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => Some(MidiEvent::note_on(time, channel, note, velocity)),
            MidiMessage::NoteOff { channel, note, .. } => {
                Some(MidiEvent::note_off(time, channel, note))
            }
            MidiMessage::ProgramChange { channel, program } => {
                Some(MidiEvent::program_change(time, channel, program))
            }
            MidiMessage::ControlChange { channel, .. } | MidiMessage::Other { channel } => {
                Some(MidiEvent::other(time, channel))
            }
            MidiMessage::Unknown => None,
        }
    }
}
