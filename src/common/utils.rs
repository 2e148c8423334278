use chrono::{DateTime, Local, Utc};

/// 单个章节区间最多包含的章节数
pub const MAX_CHAPTER_SPAN: u32 = 10_000;

/// 解析章节列表，如 `1-3,5,7-9`，结果排序去重
pub fn parse_chapter_list(input: &str) -> Result<Vec<u32>, String> {
    let mut chapters = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| format!("无效的起始章节: {}", part))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| format!("无效的结束章节: {}", part))?;
            if start > end {
                return Err(format!("起始章节不能大于结束章节: {}", part));
            }
            if end - start >= MAX_CHAPTER_SPAN {
                return Err(format!("章节区间过大: {} (最多 {} 章)", part, MAX_CHAPTER_SPAN));
            }
            chapters.extend(start..=end);
        } else {
            let chapter: u32 = part.parse().map_err(|_| format!("无效的章节: {}", part))?;
            chapters.push(chapter);
        }
    }

    chapters.sort_unstable();
    chapters.dedup();

    if chapters.is_empty() {
        return Err("没有有效的章节".to_string());
    }
    Ok(chapters)
}

pub struct FormatTool;

impl FormatTool {
    // 0.0 ~ 1.0 -> "42.5%"
    pub fn format_percentage(ratio: f64) -> String {
        format!("{:.1}%", ratio.clamp(0.0, 1.0) * 100.0)
    }

    // 本地时间
    pub fn format_timestamp(time: &DateTime<Utc>) -> String {
        time.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    /// 把章节号压缩成区间，如 `[1,2,3,5]` -> `1-3,5`
    pub fn format_chapters<'a>(chapters: impl IntoIterator<Item = &'a u32>) -> String {
        let mut sorted: Vec<u32> = chapters.into_iter().copied().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut parts = Vec::new();
        let mut iter = sorted.into_iter();
        let Some(mut start) = iter.next() else {
            return "-".to_string();
        };
        let mut end = start;
        for chapter in iter {
            if chapter == end + 1 {
                end = chapter;
                continue;
            }
            parts.push(Self::span(start, end));
            start = chapter;
            end = chapter;
        }
        parts.push(Self::span(start, end));
        parts.join(",")
    }

    fn span(start: u32, end: u32) -> String {
        if start == end {
            start.to_string()
        } else {
            format!("{}-{}", start, end)
        }
    }
}
