/// Named font-family presets offered to template authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontPreset {
    YaHei,
    SimSun,
    SimHei,
    FangSong,
    Arial,
    TimesNewRoman,
}

impl FontPreset {
    pub const ALL: [FontPreset; 6] = [
        FontPreset::YaHei,
        FontPreset::SimSun,
        FontPreset::SimHei,
        FontPreset::FangSong,
        FontPreset::Arial,
        FontPreset::TimesNewRoman,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FontPreset::YaHei => "yahei",
            FontPreset::SimSun => "simsun",
            FontPreset::SimHei => "simhei",
            FontPreset::FangSong => "fangsong",
            FontPreset::Arial => "arial",
            FontPreset::TimesNewRoman => "times",
        }
    }

    /// CSS `font-family` fallback list.
    pub fn css(&self) -> &'static str {
        match self {
            FontPreset::YaHei => "'Microsoft YaHei', '微软雅黑', 'Microsoft YaHei UI', SimSun, Arial",
            FontPreset::SimSun => "SimSun, '宋体', 'Microsoft YaHei', Arial",
            FontPreset::SimHei => "SimHei, '黑体', 'Microsoft YaHei', Arial",
            FontPreset::FangSong => "FangSong, '仿宋', 'Microsoft YaHei', SimSun",
            FontPreset::Arial => "Arial, Helvetica, sans-serif",
            FontPreset::TimesNewRoman => "'Times New Roman', Times, serif",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// Body-level style injected once into structured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyStyle {
    pub font_family: String,
    pub font_pt: u32,
}

impl BodyStyle {
    /// `font` is either a preset key or a literal CSS font-family list. Blank
    /// input falls back to the YaHei preset.
    pub fn new(font: &str, font_pt: u32) -> Self {
        let font = font.trim();
        let font_family = match FontPreset::from_key(font) {
            Some(preset) => preset.css().to_string(),
            None if font.is_empty() => FontPreset::YaHei.css().to_string(),
            None => font.to_string(),
        };
        Self {
            font_family,
            font_pt,
        }
    }

    pub fn css(&self) -> String {
        format!(
            "font-family:{}; font-size:{}pt; line-height:1.6;",
            self.font_family, self.font_pt
        )
    }
}

impl Default for BodyStyle {
    fn default() -> Self {
        Self::new(FontPreset::YaHei.key(), 10)
    }
}
