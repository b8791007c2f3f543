/// Simple localization for the terminal front end.
/// Locale comes from the `--locale` flag or the `locale` config key.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub queued: &'static str,
    pub merged: &'static str,
    pub started: &'static str,
    pub status_done: &'static str,
    pub status_failed: &'static str,
    pub status_skipped: &'static str,
    pub summary_header: &'static str,
    pub eta_unknown: &'static str,
    pub notice_prefix: &'static str,
    pub alert_prefix: &'static str,
    pub playing: &'static str,
    pub exited: &'static str,
    pub empty_library: &'static str,
}

pub static EN: Messages = Messages {
    queued: "queued",
    merged: "already queued",
    started: "started",
    status_done: "done",
    status_failed: "failed",
    status_skipped: "nothing to do",
    summary_header: "Summary",
    eta_unknown: "-",
    notice_prefix: "NOTICE",
    alert_prefix: "ALERT",
    playing: "Playing",
    exited: "Exited",
    empty_library: "Library is empty",
};

pub static ZH: Messages = Messages {
    queued: "已排队",
    merged: "已在队列中",
    started: "已开始",
    status_done: "完成",
    status_failed: "失败",
    status_skipped: "无需操作",
    summary_header: "摘要",
    eta_unknown: "-",
    notice_prefix: "通知",
    alert_prefix: "警告",
    playing: "正在游玩",
    exited: "已退出",
    empty_library: "游戏库为空",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}
