// Hover truth aggregated across an icon and its two overlay surfaces.

/// One of the surfaces that can hold the pointer while a preview is in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoverSurface {
    Icon,
    Preview,
    Title,
}

/// Pure combination of the three independent hover flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoverAggregator {
    pub icon: bool,
    pub preview: bool,
    pub title: bool,
}

impl HoverAggregator {
    pub fn new(icon: bool, preview: bool, title: bool) -> Self {
        Self {
            icon,
            preview,
            title,
        }
    }

    pub fn any_hovered(self) -> bool {
        self.icon || self.preview || self.title
    }

    pub fn icon_hovered(self) -> bool {
        self.icon
    }

    pub fn with(self, surface: HoverSurface, hovered: bool) -> Self {
        let mut next = self;
        match surface {
            HoverSurface::Icon => next.icon = hovered,
            HoverSurface::Preview => next.preview = hovered,
            HoverSurface::Title => next.title = hovered,
        }
        next
    }

    /// Overlay flags reset when the overlays themselves go away.
    pub fn without_overlays(self) -> Self {
        Self {
            icon: self.icon,
            preview: false,
            title: false,
        }
    }
}
