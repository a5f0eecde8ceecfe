use crate::language::span::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeType {
    Invalid,
    Special,
    Kprobe,
    Kretprobe,
    Uprobe,
    Uretprobe,
    Usdt,
    Tracepoint,
    Profile,
    Interval,
    Software,
    Hardware,
    Watchpoint,
    AsyncWatchpoint,
    Fentry,
    Fexit,
    Iter,
    RawTracepoint,
}

impl ProbeType {
    /// Maps a provider name or its short alias to the probe type.
    pub fn from_provider(provider: &str) -> Self {
        match provider {
            "BEGIN" | "END" => ProbeType::Special,
            "kprobe" | "k" => ProbeType::Kprobe,
            "kretprobe" | "kr" => ProbeType::Kretprobe,
            "uprobe" | "u" => ProbeType::Uprobe,
            "uretprobe" | "ur" => ProbeType::Uretprobe,
            "usdt" | "U" => ProbeType::Usdt,
            "tracepoint" | "t" => ProbeType::Tracepoint,
            "profile" | "p" => ProbeType::Profile,
            "interval" | "i" => ProbeType::Interval,
            "software" | "s" => ProbeType::Software,
            "hardware" | "h" => ProbeType::Hardware,
            "watchpoint" | "w" => ProbeType::Watchpoint,
            "asyncwatchpoint" | "aw" => ProbeType::AsyncWatchpoint,
            "fentry" | "f" | "kfunc" => ProbeType::Fentry,
            "fexit" | "fr" | "kretfunc" => ProbeType::Fexit,
            "iter" | "it" => ProbeType::Iter,
            "rawtracepoint" | "rt" => ProbeType::RawTracepoint,
            _ => ProbeType::Invalid,
        }
    }

    pub fn is_userspace(self) -> bool {
        matches!(
            self,
            ProbeType::Uprobe | ProbeType::Uretprobe | ProbeType::Usdt
        )
    }

    pub fn is_exit(self) -> bool {
        matches!(
            self,
            ProbeType::Kretprobe | ProbeType::Uretprobe | ProbeType::Fexit
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpansionType {
    #[default]
    None,
    /// One program per wildcard match.
    Full,
    /// One program attached to every match at once.
    Multi,
}

/// One probe target, e.g. `kprobe:vfs_read` or `uprobe:/bin/sh:main`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachPoint {
    /// Unparsed input as written by the user.
    pub raw_input: String,
    pub provider: String,
    pub target: String,
    pub lang: String,
    pub ns: String,
    pub func: String,
    pub freq: i64,
    pub len: u64,
    pub mode: String,
    pub address: u64,
    pub func_offset: u64,
    pub expansion: ExpansionType,
    pub ignore_invalid: bool,
    pub index: usize,
    pub loc: Location,
}

fn erase_prefix(value: &mut String) -> String {
    match value.find(':') {
        Some(pos) => {
            let prefix = value[..pos].to_string();
            value.replace_range(..=pos, "");
            prefix
        }
        None => String::new(),
    }
}

impl AttachPoint {
    pub fn new(provider: &str, loc: Location) -> Self {
        Self {
            raw_input: provider.to_string(),
            provider: provider.to_string(),
            loc,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self.raw_input = self.name();
        self
    }

    pub fn with_func(mut self, func: &str) -> Self {
        self.func = func.to_string();
        self.raw_input = self.name();
        self
    }

    pub fn probe_type(&self) -> ProbeType {
        ProbeType::from_provider(&self.provider)
    }

    pub fn has_wildcard(&self) -> bool {
        [&self.target, &self.ns, &self.func]
            .iter()
            .any(|part| part.contains('*') || part.contains('?'))
    }

    /// Canonical name built from the non-empty fields in a fixed order.
    pub fn name(&self) -> String {
        let mut name = self.provider.clone();
        for part in [&self.target, &self.lang, &self.ns] {
            if !part.is_empty() {
                name.push(':');
                name.push_str(part);
            }
        }
        if !self.func.is_empty() {
            name.push(':');
            name.push_str(&self.func);
            if self.func_offset != 0 {
                name.push_str(&format!("+{}", self.func_offset));
            }
        }
        if self.address != 0 {
            name.push_str(&format!(":{}", self.address));
        }
        if self.freq != 0 {
            name.push_str(&format!(":{}", self.freq));
        }
        if self.len != 0 {
            name.push_str(&format!(":{}", self.len));
        }
        if !self.mode.is_empty() {
            name.push(':');
            name.push_str(&self.mode);
        }
        name
    }

    /// Copy of this attach point bound to one concrete wildcard `match`.
    pub fn expansion_copy(&self, matched: &str) -> AttachPoint {
        let mut ap = self.clone();
        match self.probe_type() {
            ProbeType::Kprobe | ProbeType::Kretprobe => {
                ap.func = matched.to_string();
                if matched.contains(':') {
                    ap.target = erase_prefix(&mut ap.func);
                }
            }
            ProbeType::Uprobe
            | ProbeType::Uretprobe
            | ProbeType::Fentry
            | ProbeType::Fexit
            | ProbeType::Tracepoint => {
                ap.func = matched.to_string();
                ap.target = erase_prefix(&mut ap.func);
            }
            ProbeType::Usdt => {
                ap.func = matched.to_string();
                ap.target = erase_prefix(&mut ap.func);
                ap.ns = erase_prefix(&mut ap.func);
            }
            ProbeType::Watchpoint | ProbeType::AsyncWatchpoint => {
                ap.func = matched.to_string();
                erase_prefix(&mut ap.func);
            }
            ProbeType::RawTracepoint => {
                ap.func = matched.to_string();
            }
            ProbeType::Software
            | ProbeType::Hardware
            | ProbeType::Interval
            | ProbeType::Profile
            | ProbeType::Special
            | ProbeType::Iter
            | ProbeType::Invalid => {}
        }
        ap
    }
}
