//! 摄像头参数
//!
//! 在第一次录制前一次性交给采集后端。

/// H.264 编码码率（bit/s）
pub const DEFAULT_BITRATE: u32 = 1_900_000;

/// 归一化数字变焦区域 `(x, y, width, height)`，各分量取值 `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Zoom {
    /// 全画面（不裁剪）
    pub const IDENTITY: Zoom = Zoom {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// 各分量都在 `[0, 1]` 且宽高非零
    pub fn is_valid(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && in_unit(self.width)
            && in_unit(self.height)
            && self.width > 0.0
            && self.height > 0.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<(f64, f64, f64, f64)> for Zoom {
    fn from((x, y, width, height): (f64, f64, f64, f64)) -> Self {
        Self::new(x, y, width, height)
    }
}

/// 像素裁剪矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 画面旋转，只支持 0° 和 180°
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Half,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Self::None),
            180 => Some(Self::Half),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Half => 180,
        }
    }
}

/// 摄像头配置
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub zoom: Zoom,
    pub rotation: Rotation,
    pub hflip: bool,
    pub vflip: bool,
    /// H.264 码率（bit/s）
    pub bitrate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            zoom: Zoom::IDENTITY,
            rotation: Rotation::None,
            hflip: false,
            vflip: false,
            bitrate: DEFAULT_BITRATE,
        }
    }
}

impl CameraConfig {
    /// 把归一化变焦换算成像素矩形（截断取整）
    ///
    /// 全画面变焦返回 `None`，表示不设置裁剪。
    pub fn crop_rect(&self) -> Option<CropRect> {
        if self.zoom.is_identity() {
            return None;
        }
        let scale = |v: f64, extent: u32| (v * f64::from(extent)) as u32;
        Some(CropRect {
            x: scale(self.zoom.x, self.width),
            y: scale(self.zoom.y, self.height),
            width: scale(self.zoom.width, self.width),
            height: scale(self.zoom.height, self.height),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_zoom_has_no_crop() {
        let config = CameraConfig::default();
        assert_eq!(config.crop_rect(), None);
        assert_eq!(config.bitrate, 1_900_000);
    }

    #[test]
    fn test_crop_rect_in_pixels() {
        let config = CameraConfig {
            zoom: Zoom::new(0.25, 0.25, 0.5, 0.5),
            ..CameraConfig::default()
        };
        assert_eq!(
            config.crop_rect(),
            Some(CropRect {
                x: 480,
                y: 270,
                width: 960,
                height: 540,
            })
        );
    }

    #[test]
    fn test_crop_rect_truncates() {
        let config = CameraConfig {
            width: 1000,
            height: 1000,
            zoom: Zoom::new(0.3333, 0.0, 0.6667, 1.0),
            ..CameraConfig::default()
        };
        let crop = config.crop_rect().unwrap();
        assert_eq!(crop.x, 333);
        assert_eq!(crop.width, 666);
        assert_eq!(crop.height, 1000);
    }

    #[test]
    fn test_zoom_validation() {
        assert!(Zoom::IDENTITY.is_valid());
        assert!(Zoom::new(0.1, 0.2, 0.5, 0.5).is_valid());
        assert!(!Zoom::new(-0.1, 0.0, 1.0, 1.0).is_valid());
        assert!(!Zoom::new(0.0, 0.0, 1.5, 1.0).is_valid());
        assert!(!Zoom::new(0.0, 0.0, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_rotation() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::None));
        assert_eq!(Rotation::from_degrees(180), Some(Rotation::Half));
        assert_eq!(Rotation::from_degrees(90), None);
        assert_eq!(Rotation::Half.degrees(), 180);
    }
}
