//! Channel envelope and LFO settings.
//!
//! Each channel carries one 68-byte record per modulation target
//! (panning, volume, pitch, mod X, mod Y), stored as a separate event.

use bitflags::bitflags;
use lazy_static::lazy_static;

use crate::codec::stream::EventStream;
use crate::codec::structs::{Field, FieldType, StructLayout};
use crate::error::PropertyError;
use crate::limits::DATA;
use crate::model::base::{Model, ModelBase};
use crate::model::descriptor::{FlagProp, FlagSource, Property, StructProp};
use crate::model::registry::Registry;

pub const ENVELOPE_LFO_EVENT: u8 = DATA + 10;

/// Modulation targets, in the order their records appear.
pub const TARGET_NAMES: [&str; 5] = ["Panning", "Volume", "Pitch", "Mod X", "Mod Y"];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EnvelopeFlags: u32 {
        const TEMPO_SYNC = 1 << 1;
        /// Seen on volume envelopes only.
        const UNKNOWN = 1 << 2;
        const RETRIGGER = 1 << 5;
    }
}

/// LFO waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LfoShape {
    Sine,
    Triangle,
    Pulse,
}

impl LfoShape {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LfoShape::Sine),
            1 => Some(LfoShape::Triangle),
            2 => Some(LfoShape::Pulse),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        self as u32
    }
}

static FIELDS: [Field; 12] = [
    Field::new("flags", 0, FieldType::U32),
    Field::new("enabled", 4, FieldType::I32),
    Field::new("predelay", 8, FieldType::U32),
    Field::new("attack", 12, FieldType::U32),
    Field::new("hold", 16, FieldType::U32),
    Field::new("decay", 20, FieldType::U32),
    Field::new("sustain", 24, FieldType::U32),
    Field::new("release", 28, FieldType::U32),
    Field::new("lfo_shape", 52, FieldType::U32),
    Field::new("attack_tension", 56, FieldType::I32),
    Field::new("sustain_tension", 60, FieldType::I32),
    Field::new("release_tension", 64, FieldType::I32),
];

pub static LAYOUT: StructLayout = StructLayout::new("EnvelopeLfo", 68, &FIELDS);

const IDS: &[u8] = &[ENVELOPE_LFO_EVENT];

/// Predelay, attack, hold, decay and release times.
pub const TIME_RANGE: (i64, i64) = (100, 65536);
pub const SUSTAIN_RANGE: (i64, i64) = (0, 128);
pub const TENSION_RANGE: (i64, i64) = (-128, 128);

macro_rules! ranged {
    ($index:expr, $range:expr) => {
        StructProp::ranged(IDS, &LAYOUT, &FIELDS[$index], $range.0, $range.1)
    };
}

static FLAGS: StructProp<u32> = StructProp::new(IDS, &LAYOUT, &FIELDS[0]);
static TEMPO_SYNC: FlagProp = FlagProp::new(
    IDS,
    FlagSource::Field(&LAYOUT, &FIELDS[0]),
    EnvelopeFlags::TEMPO_SYNC.bits() as u64,
);
static RETRIGGER: FlagProp = FlagProp::new(
    IDS,
    FlagSource::Field(&LAYOUT, &FIELDS[0]),
    EnvelopeFlags::RETRIGGER.bits() as u64,
);
static ENABLED: EnabledProp = EnabledProp(StructProp::new(IDS, &LAYOUT, &FIELDS[1]));
static PREDELAY: StructProp<u32> = ranged!(2, TIME_RANGE);
static ATTACK: StructProp<u32> = ranged!(3, TIME_RANGE);
static HOLD: StructProp<u32> = ranged!(4, TIME_RANGE);
static DECAY: StructProp<u32> = ranged!(5, TIME_RANGE);
static SUSTAIN: StructProp<u32> = ranged!(6, SUSTAIN_RANGE);
static RELEASE: StructProp<u32> = ranged!(7, TIME_RANGE);
static LFO_SHAPE: StructProp<u32> = StructProp::new(IDS, &LAYOUT, &FIELDS[8]);
static ATTACK_TENSION: StructProp<i32> = ranged!(9, TENSION_RANGE);
static SUSTAIN_TENSION: StructProp<i32> = ranged!(10, TENSION_RANGE);
static RELEASE_TENSION: StructProp<i32> = ranged!(11, TENSION_RANGE);

lazy_static! {
    pub static ref ENVELOPE_LFO_PROPERTIES: Registry = Registry::new("EnvelopeLfo")
        .with("enabled", &ENABLED)
        .with("tempo_sync", &TEMPO_SYNC)
        .with("retrigger", &RETRIGGER)
        .with("predelay", &PREDELAY)
        .with("attack", &ATTACK)
        .with("hold", &HOLD)
        .with("decay", &DECAY)
        .with("sustain", &SUSTAIN)
        .with("release", &RELEASE)
        .with("lfo_shape", &LFO_SHAPE)
        .with("attack_tension", &ATTACK_TENSION)
        .with("sustain_tension", &SUSTAIN_TENSION)
        .with("release_tension", &RELEASE_TENSION);
}

/// The enabled field holds -1 for on and 0 for off.
struct EnabledProp(StructProp<i32>);

impl Property for EnabledProp {
    type Value = bool;

    fn get(&self, model: &Model, stream: &EventStream) -> Option<bool> {
        self.0.get(model, stream).map(|raw| raw == -1)
    }

    fn set(&self, model: &mut Model, stream: &mut EventStream, value: bool) -> Result<(), PropertyError> {
        self.0.set(model, stream, if value { -1 } else { 0 })
    }
}

/// One envelope/LFO record.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeLfo {
    model: Model,
}

impl EnvelopeLfo {
    /// A view of the record event at `pos`.
    pub fn new(pos: usize) -> Self {
        Self {
            model: Model::single("EnvelopeLfo", pos),
        }
    }

    /// Every record in the stream, in stream order.
    pub fn all(stream: &EventStream) -> Vec<EnvelopeLfo> {
        stream
            .index()
            .of(ENVELOPE_LFO_EVENT)
            .iter()
            .map(|&pos| EnvelopeLfo::new(pos))
            .collect()
    }

    pub fn flags(&self, stream: &EventStream) -> Option<EnvelopeFlags> {
        FLAGS.get(&self.model, stream).map(EnvelopeFlags::from_bits_retain)
    }

    pub fn enabled(&self, stream: &EventStream) -> Option<bool> {
        ENABLED.get(&self.model, stream)
    }

    pub fn set_enabled(&mut self, stream: &mut EventStream, on: bool) -> Result<(), PropertyError> {
        ENABLED.set(&mut self.model, stream, on)
    }

    /// Whether the LFO is synced to tempo.
    pub fn tempo_sync(&self, stream: &EventStream) -> Option<bool> {
        TEMPO_SYNC.get(&self.model, stream)
    }

    pub fn set_tempo_sync(&mut self, stream: &mut EventStream, on: bool) -> Result<(), PropertyError> {
        TEMPO_SYNC.set(&mut self.model, stream, on)
    }

    pub fn retrigger(&self, stream: &EventStream) -> Option<bool> {
        RETRIGGER.get(&self.model, stream)
    }

    pub fn set_retrigger(&mut self, stream: &mut EventStream, on: bool) -> Result<(), PropertyError> {
        RETRIGGER.set(&mut self.model, stream, on)
    }

    pub fn predelay(&self, stream: &EventStream) -> Option<u32> {
        PREDELAY.get(&self.model, stream)
    }

    pub fn set_predelay(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        PREDELAY.set(&mut self.model, stream, value)
    }

    pub fn attack(&self, stream: &EventStream) -> Option<u32> {
        ATTACK.get(&self.model, stream)
    }

    pub fn set_attack(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        ATTACK.set(&mut self.model, stream, value)
    }

    pub fn hold(&self, stream: &EventStream) -> Option<u32> {
        HOLD.get(&self.model, stream)
    }

    pub fn set_hold(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        HOLD.set(&mut self.model, stream, value)
    }

    pub fn decay(&self, stream: &EventStream) -> Option<u32> {
        DECAY.get(&self.model, stream)
    }

    pub fn set_decay(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        DECAY.set(&mut self.model, stream, value)
    }

    /// 0 to 128.
    pub fn sustain(&self, stream: &EventStream) -> Option<u32> {
        SUSTAIN.get(&self.model, stream)
    }

    pub fn set_sustain(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        SUSTAIN.set(&mut self.model, stream, value)
    }

    pub fn release(&self, stream: &EventStream) -> Option<u32> {
        RELEASE.get(&self.model, stream)
    }

    pub fn set_release(&mut self, stream: &mut EventStream, value: u32) -> Result<(), PropertyError> {
        RELEASE.set(&mut self.model, stream, value)
    }

    /// `None` for unknown shape codes as well as missing data.
    pub fn lfo_shape(&self, stream: &EventStream) -> Option<LfoShape> {
        LFO_SHAPE.get(&self.model, stream).and_then(LfoShape::from_raw)
    }

    pub fn set_lfo_shape(&mut self, stream: &mut EventStream, shape: LfoShape) -> Result<(), PropertyError> {
        LFO_SHAPE.set(&mut self.model, stream, shape.raw())
    }

    /// -128 to 128.
    pub fn attack_tension(&self, stream: &EventStream) -> Option<i32> {
        ATTACK_TENSION.get(&self.model, stream)
    }

    pub fn set_attack_tension(&mut self, stream: &mut EventStream, value: i32) -> Result<(), PropertyError> {
        ATTACK_TENSION.set(&mut self.model, stream, value)
    }

    pub fn sustain_tension(&self, stream: &EventStream) -> Option<i32> {
        SUSTAIN_TENSION.get(&self.model, stream)
    }

    pub fn set_sustain_tension(&mut self, stream: &mut EventStream, value: i32) -> Result<(), PropertyError> {
        SUSTAIN_TENSION.set(&mut self.model, stream, value)
    }

    pub fn release_tension(&self, stream: &EventStream) -> Option<i32> {
        RELEASE_TENSION.get(&self.model, stream)
    }

    pub fn set_release_tension(&mut self, stream: &mut EventStream, value: i32) -> Result<(), PropertyError> {
        RELEASE_TENSION.set(&mut self.model, stream, value)
    }
}

impl ModelBase for EnvelopeLfo {
    fn model(&self) -> &Model {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn properties(&self) -> Option<&'static Registry> {
        Some(&ENVELOPE_LFO_PROPERTIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::text::TextEncoding;
    use crate::error::ErrorKind;
    use crate::model::event::Event;
    use crate::model::value::PropertyValue;

    fn record() -> Vec<u8> {
        let mut r = vec![0u8; 68];
        let mut put = |offset: usize, bytes: [u8; 4]| r[offset..offset + 4].copy_from_slice(&bytes);
        put(0, (EnvelopeFlags::TEMPO_SYNC | EnvelopeFlags::UNKNOWN).bits().to_le_bytes());
        put(4, (-1i32).to_le_bytes());
        put(8, 100u32.to_le_bytes());
        put(12, 20000u32.to_le_bytes());
        put(16, 20000u32.to_le_bytes());
        put(20, 30000u32.to_le_bytes());
        put(24, 50u32.to_le_bytes());
        put(28, 20000u32.to_le_bytes());
        put(32, [0xCD; 4]);
        put(52, 2u32.to_le_bytes());
        put(64, (-101i32).to_le_bytes());
        r
    }

    fn fixture() -> (EventStream, EnvelopeLfo) {
        let mut stream = EventStream::with_text_encoding(TextEncoding::Wide);
        stream.append(Event::byte(1, 0).unwrap());
        stream.append(Event::data(ENVELOPE_LFO_EVENT, record()).unwrap());
        let envelope = EnvelopeLfo::all(&stream).remove(0);
        (stream, envelope)
    }

    #[test]
    fn test_read() {
        let (stream, envelope) = fixture();
        assert_eq!(envelope.enabled(&stream), Some(true));
        assert_eq!(envelope.tempo_sync(&stream), Some(true));
        assert_eq!(envelope.retrigger(&stream), Some(false));
        assert_eq!(envelope.predelay(&stream), Some(100));
        assert_eq!(envelope.attack(&stream), Some(20000));
        assert_eq!(envelope.hold(&stream), Some(20000));
        assert_eq!(envelope.decay(&stream), Some(30000));
        assert_eq!(envelope.sustain(&stream), Some(50));
        assert_eq!(envelope.release(&stream), Some(20000));
        assert_eq!(envelope.lfo_shape(&stream), Some(LfoShape::Pulse));
        assert_eq!(envelope.attack_tension(&stream), Some(0));
        assert_eq!(envelope.sustain_tension(&stream), Some(0));
        assert_eq!(envelope.release_tension(&stream), Some(-101));
    }

    #[test]
    fn test_write_preserves_flags_and_gaps() {
        let (mut stream, mut envelope) = fixture();
        envelope.set_retrigger(&mut stream, true).unwrap();
        envelope.set_tempo_sync(&mut stream, false).unwrap();
        envelope.set_enabled(&mut stream, false).unwrap();
        envelope.set_lfo_shape(&mut stream, LfoShape::Sine).unwrap();

        assert_eq!(
            envelope.flags(&stream),
            Some(EnvelopeFlags::RETRIGGER | EnvelopeFlags::UNKNOWN)
        );
        assert_eq!(envelope.enabled(&stream), Some(false));

        let payload = stream.get(1).unwrap().payload();
        assert_eq!(&payload[4..8], &[0; 4]);
        assert_eq!(&payload[32..36], &[0xCD; 4]);
        assert_eq!(&payload[52..56], &[0; 4]);
    }

    #[test]
    fn test_short_record_reads_none() {
        let mut stream = EventStream::with_text_encoding(TextEncoding::Wide);
        stream.append(Event::data(ENVELOPE_LFO_EVENT, vec![0; 10]).unwrap());
        let mut envelope = EnvelopeLfo::new(0);
        assert_eq!(envelope.enabled(&stream), Some(false));
        assert_eq!(envelope.release_tension(&stream), None);
        assert!(envelope.set_attack(&mut stream, 20000).is_err());
        assert_eq!(stream.get(0).unwrap().payload(), &[0; 10]);
    }

    #[test]
    fn test_value_ranges() {
        let (mut stream, mut envelope) = fixture();
        envelope.set_predelay(&mut stream, 100).unwrap();
        envelope.set_hold(&mut stream, 65536).unwrap();
        envelope.set_decay(&mut stream, 40000).unwrap();
        envelope.set_sustain(&mut stream, 128).unwrap();
        envelope.set_release(&mut stream, 100).unwrap();
        envelope.set_attack_tension(&mut stream, -128).unwrap();
        envelope.set_sustain_tension(&mut stream, 128).unwrap();
        envelope.set_release_tension(&mut stream, 0).unwrap();
        assert_eq!(envelope.hold(&stream), Some(65536));
        assert_eq!(envelope.decay(&stream), Some(40000));
        assert_eq!(envelope.sustain(&stream), Some(128));
        assert_eq!(envelope.attack_tension(&stream), Some(-128));
        assert_eq!(envelope.release_tension(&stream), Some(0));

        let before = stream.serialize();
        let errors = [
            envelope.set_predelay(&mut stream, 99).unwrap_err(),
            envelope.set_attack(&mut stream, 65537).unwrap_err(),
            envelope.set_sustain(&mut stream, 129).unwrap_err(),
            envelope.set_release_tension(&mut stream, -129).unwrap_err(),
            envelope.set_attack_tension(&mut stream, 129).unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Range);
        }
        assert_eq!(stream.serialize(), before);
    }

    #[test]
    fn test_registry_rejects_out_of_range() {
        let (mut stream, mut envelope) = fixture();
        let registry = envelope.properties().unwrap();
        let err = registry
            .set("sustain", envelope.model_mut(), &mut stream, PropertyValue::Int(500))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(envelope.sustain(&stream), Some(50));
    }

    #[test]
    fn test_registry_and_save() {
        let (stream, envelope) = fixture();
        let values = envelope.properties().unwrap().read_all(envelope.model(), &stream);
        assert_eq!(values[0], ("enabled", Some(PropertyValue::Bool(true))));
        assert_eq!(values.len(), 13);
        assert_eq!(envelope.save(&stream), stream.get(1).unwrap().serialize());
    }
}
