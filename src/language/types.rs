use std::fmt;

/// How stack traces are rendered; also the value space of the `stack_mode`
/// config key and of stack-mode literals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StackModeKind {
    Bpftrace,
    Perf,
    Raw,
}

impl StackModeKind {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "bpftrace" => Some(StackModeKind::Bpftrace),
            "perf" => Some(StackModeKind::Perf),
            "raw" => Some(StackModeKind::Raw),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StackModeKind::Bpftrace => "bpftrace",
            StackModeKind::Perf => "perf",
            StackModeKind::Raw => "raw",
        }
    }
}

/// Value types that only exist inside maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Count,
    Sum { signed: bool },
    Min { signed: bool },
    Max { signed: bool },
    Avg { signed: bool },
    Stats { signed: bool },
    Hist,
    Lhist,
}

impl AggregateKind {
    pub fn name(self) -> &'static str {
        match self {
            AggregateKind::Count => "count_t",
            AggregateKind::Sum { signed: true } => "sum_t",
            AggregateKind::Sum { signed: false } => "usum_t",
            AggregateKind::Min { signed: true } => "min_t",
            AggregateKind::Min { signed: false } => "umin_t",
            AggregateKind::Max { signed: true } => "max_t",
            AggregateKind::Max { signed: false } => "umax_t",
            AggregateKind::Avg { signed: true } => "avg_t",
            AggregateKind::Avg { signed: false } => "uavg_t",
            AggregateKind::Stats { signed: true } => "stats_t",
            AggregateKind::Stats { signed: false } => "ustats_t",
            AggregateKind::Hist => "hist_t",
            AggregateKind::Lhist => "lhist_t",
        }
    }

    /// Per-key storage in bytes.
    pub fn size(self) -> usize {
        match self {
            AggregateKind::Avg { .. } | AggregateKind::Stats { .. } => 16,
            _ => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: SizedType,
    pub offset: usize,
}

/// A C-like record. An empty field list means the layout has not been
/// resolved yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Field>,
    pub size: usize,
}

impl Record {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            size: 0,
        }
    }

    /// Lays the fields out with natural alignment.
    pub fn with_fields(name: impl Into<String>, fields: Vec<(String, SizedType)>) -> Self {
        let mut offset = 0usize;
        let mut max_align = 1usize;
        let mut laid_out = Vec::with_capacity(fields.len());
        for (field_name, ty) in fields {
            let align = ty.alignment();
            max_align = max_align.max(align);
            offset = align_up(offset, align);
            let size = ty.size();
            laid_out.push(Field {
                name: field_name,
                ty,
                offset,
            });
            offset += size;
        }
        Self {
            name: name.into(),
            fields: laid_out,
            size: align_up(offset, max_align),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    if align <= 1 {
        offset
    } else {
        offset.div_ceil(align) * align
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SizedType {
    None,
    Void,
    Integer { bits: u8, signed: bool },
    String { size: usize },
    Buffer { size: usize },
    Inet { size: usize },
    StackMode(StackModeKind),
    Pointer(Box<SizedType>),
    Array { element: Box<SizedType>, len: usize },
    Record(Record),
    Tuple(Vec<SizedType>),
    Aggregate(AggregateKind),
    Ksym,
    Usym,
    Timestamp,
}

impl SizedType {
    pub fn int(bits: u8) -> Self {
        SizedType::Integer { bits, signed: true }
    }

    pub fn uint(bits: u8) -> Self {
        SizedType::Integer {
            bits,
            signed: false,
        }
    }

    pub fn int64() -> Self {
        Self::int(64)
    }

    pub fn uint64() -> Self {
        Self::uint(64)
    }

    /// Result of logical operators: a single byte.
    pub fn boolean() -> Self {
        Self::uint(8)
    }

    pub fn string(size: usize) -> Self {
        SizedType::String { size }
    }

    pub fn pointer(pointee: SizedType) -> Self {
        SizedType::Pointer(Box::new(pointee))
    }

    pub fn array(element: SizedType, len: usize) -> Self {
        SizedType::Array {
            element: Box::new(element),
            len,
        }
    }

    /// `struct <name>` with `pointer_level` levels of indirection.
    pub fn record(name: &str, pointer_level: usize) -> Self {
        let record_name = if name.starts_with("struct ") || name.starts_with("union ") {
            name.to_string()
        } else {
            format!("struct {name}")
        };
        let mut ty = SizedType::Record(Record::named(record_name));
        for _ in 0..pointer_level {
            ty = SizedType::pointer(ty);
        }
        ty
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SizedType::None)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, SizedType::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, SizedType::Integer { .. })
    }

    /// Types that can only live as map values.
    pub fn is_map_only(&self) -> bool {
        matches!(self, SizedType::Aggregate(_))
    }

    pub fn pointee(&self) -> Option<&SizedType> {
        match self {
            SizedType::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            SizedType::Record(record) => Some(record),
            _ => None,
        }
    }

    /// The record at the bottom of any pointer chain.
    pub fn innermost_record(&self) -> Option<&Record> {
        match self {
            SizedType::Pointer(inner) => inner.innermost_record(),
            SizedType::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            SizedType::None | SizedType::Void => 0,
            SizedType::Integer { bits, .. } => usize::from(*bits).div_ceil(8),
            SizedType::String { size } | SizedType::Buffer { size } | SizedType::Inet { size } => {
                *size
            }
            SizedType::StackMode(_) | SizedType::Pointer(_) | SizedType::Timestamp => 8,
            SizedType::Array { element, len } => element.size() * len,
            SizedType::Record(record) => record.size,
            SizedType::Tuple(elements) => {
                let fields = elements
                    .iter()
                    .enumerate()
                    .map(|(idx, ty)| (idx.to_string(), ty.clone()))
                    .collect();
                Record::with_fields("tuple", fields).size
            }
            SizedType::Aggregate(kind) => kind.size(),
            SizedType::Ksym | SizedType::Usym => 16,
        }
    }

    fn alignment(&self) -> usize {
        match self {
            SizedType::Integer { .. } | SizedType::Pointer(_) | SizedType::Timestamp => {
                self.size().clamp(1, 8)
            }
            SizedType::Array { element, .. } => element.alignment(),
            SizedType::Record(record) => record
                .fields
                .iter()
                .map(|field| field.ty.alignment())
                .max()
                .unwrap_or(1),
            SizedType::Tuple(elements) => elements
                .iter()
                .map(SizedType::alignment)
                .max()
                .unwrap_or(1),
            SizedType::StackMode(_)
            | SizedType::Aggregate(_)
            | SizedType::Ksym
            | SizedType::Usym => 8,
            _ => 1,
        }
    }

    /// Whether a value of `self` can be stored in `other` without loss.
    pub fn fits_into(&self, other: &SizedType) -> bool {
        match (self, other) {
            (
                SizedType::Integer {
                    bits: from_bits,
                    signed: from_signed,
                },
                SizedType::Integer {
                    bits: to_bits,
                    signed: to_signed,
                },
            ) => {
                if from_signed == to_signed {
                    from_bits <= to_bits
                } else {
                    !from_signed && from_bits < to_bits
                }
            }
            (SizedType::String { size: from }, SizedType::String { size: to }) => from <= to,
            (SizedType::Tuple(from), SizedType::Tuple(to)) => {
                from.len() == to.len() && from.iter().zip(to).all(|(a, b)| a.fits_into(b))
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for SizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizedType::None => write!(f, "none"),
            SizedType::Void => write!(f, "void"),
            SizedType::Integer { bits, signed } => {
                write!(f, "{}int{}", if *signed { "" } else { "u" }, bits)
            }
            SizedType::String { size } => write!(f, "string[{size}]"),
            SizedType::Buffer { size } => write!(f, "buffer[{size}]"),
            SizedType::Inet { size } => write!(f, "inet[{size}]"),
            SizedType::StackMode(mode) => write!(f, "stack_mode({})", mode.as_str()),
            SizedType::Pointer(inner) => write!(f, "{inner} *"),
            SizedType::Array { element, len } => write!(f, "{element}[{len}]"),
            SizedType::Record(record) => write!(f, "{}", record.name),
            SizedType::Tuple(elements) => {
                let rendered: Vec<String> = elements.iter().map(ToString::to_string).collect();
                write!(f, "({})", rendered.join(","))
            }
            SizedType::Aggregate(kind) => write!(f, "{}", kind.name()),
            SizedType::Ksym => write!(f, "ksym_t"),
            SizedType::Usym => write!(f, "usym_t"),
            SizedType::Timestamp => write!(f, "timestamp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_script_spelling() {
        assert_eq!(SizedType::int64().to_string(), "int64");
        assert_eq!(SizedType::uint(8).to_string(), "uint8");
        assert_eq!(SizedType::string(13).to_string(), "string[13]");
        assert_eq!(
            SizedType::record("task_struct", 1).to_string(),
            "struct task_struct *"
        );
        assert_eq!(SizedType::array(SizedType::int(8), 4).to_string(), "int8[4]");
        assert_eq!(
            SizedType::Tuple(vec![SizedType::int64(), SizedType::string(3)]).to_string(),
            "(int64,string[3])"
        );
    }

    #[test]
    fn record_layout_uses_natural_alignment() {
        let record = Record::with_fields(
            "struct sample",
            vec![
                ("flag".into(), SizedType::uint(8)),
                ("value".into(), SizedType::int64()),
                ("tag".into(), SizedType::int(16)),
            ],
        );
        assert_eq!(record.field("value").map(|f| f.offset), Some(8));
        assert_eq!(record.field("tag").map(|f| f.offset), Some(16));
        assert_eq!(record.size, 24);
    }

    #[test]
    fn integer_fit_respects_signedness() {
        assert!(SizedType::uint(32).fits_into(&SizedType::int64()));
        assert!(!SizedType::int64().fits_into(&SizedType::uint64()));
        assert!(SizedType::int(8).fits_into(&SizedType::int(32)));
    }
}
