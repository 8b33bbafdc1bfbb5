use ratatui::layout::Rect;

/// Minimum outer tile size: 40×6 inner cells plus the border.
pub const MIN_TILE_WIDTH: u16 = 42;
pub const MIN_TILE_HEIGHT: u16 = 8;

pub const HEADER_HEIGHT: u16 = 2;
pub const FOOTER_HEIGHT: u16 = 1;

/// Completed hosts collapse into the minimized band after this long.
pub const AUTO_MINIMIZE_TIMEOUT_SECS: u64 = 30;

/// Preferred width/height ratio of a tile; the grid row count minimizing the
/// distance to it wins.
const TILE_ASPECT: f64 = 3.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridLayout {
    /// (host index, tile rect) for hosts shown in the grid.
    pub tiles: Vec<(usize, Rect)>,
    /// Hosts with no space on screen; reachable through the menu.
    pub hidden: Vec<usize>,
    /// (host index, one-row rect) entries in the bottom band.
    pub minimized: Vec<(usize, Rect)>,
    pub header: Rect,
    pub footer: Rect,
}

/// Tile the visible hosts into the terminal. Grid rows are chosen to
/// minimize aspect distortion subject to the minimum tile size; when not
/// every host fits, the leading ones are shown and the rest hidden.
pub fn compute_grid(
    width: u16,
    height: u16,
    visible: &[usize],
    minimized: &[usize],
) -> GridLayout {
    let header = Rect::new(0, 0, width, HEADER_HEIGHT.min(height));
    let footer_y = height.saturating_sub(FOOTER_HEIGHT);
    let footer = Rect::new(0, footer_y, width, height - footer_y);

    let avail = height
        .saturating_sub(HEADER_HEIGHT)
        .saturating_sub(FOOTER_HEIGHT);

    // Minimized band sits directly above the footer, one row per host,
    // never eating more than a third of the space.
    let band_cap = (avail / 3) as usize;
    let band_rows = minimized.len().min(band_cap) as u16;
    let grid_height = avail.saturating_sub(band_rows);

    let mut layout = GridLayout {
        header,
        footer,
        ..GridLayout::default()
    };

    let band_y = HEADER_HEIGHT + grid_height;
    for (i, &host) in minimized.iter().enumerate() {
        if (i as u16) < band_rows {
            layout
                .minimized
                .push((host, Rect::new(0, band_y + i as u16, width, 1)));
        } else {
            layout.hidden.push(host);
        }
    }

    let cap_rows = (grid_height / MIN_TILE_HEIGHT) as usize;
    let cap_cols = (width / MIN_TILE_WIDTH) as usize;
    let shown = visible.len().min(cap_rows * cap_cols);
    layout.hidden.extend(visible.iter().skip(shown).copied());
    if shown == 0 {
        return layout;
    }

    let rows = best_row_count(shown, cap_rows, cap_cols, width, grid_height);
    let cols = shown.div_ceil(rows);

    let col_widths = split_evenly(width, cols as u16);
    let row_heights = split_evenly(grid_height, rows as u16);

    let mut y = HEADER_HEIGHT;
    let mut idx = 0;
    for rh in &row_heights {
        let mut x = 0;
        for cw in &col_widths {
            if idx < shown {
                layout
                    .tiles
                    .push((visible[idx], Rect::new(x, y, *cw, *rh)));
                idx += 1;
            }
            x += cw;
        }
        y += rh;
    }
    layout
}

fn best_row_count(shown: usize, cap_rows: usize, cap_cols: usize, width: u16, height: u16) -> usize {
    let mut best = cap_rows.max(1);
    let mut best_score = f64::INFINITY;
    for rows in 1..=cap_rows.min(shown) {
        let cols = shown.div_ceil(rows);
        if cols > cap_cols {
            continue;
        }
        let tile_w = width as f64 / cols as f64;
        let tile_h = height as f64 / rows as f64;
        let score = (tile_w / tile_h - TILE_ASPECT).abs();
        if score < best_score {
            best_score = score;
            best = rows;
        }
    }
    best
}

fn split_evenly(total: u16, parts: u16) -> Vec<u16> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let extra = total % parts;
    (0..parts)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// One host occupying everything between header and footer.
pub fn full_screen_rect(width: u16, height: u16) -> Rect {
    Rect::new(
        0,
        HEADER_HEIGHT,
        width,
        height
            .saturating_sub(HEADER_HEIGHT)
            .saturating_sub(FOOTER_HEIGHT),
    )
}

/// Centered box of ⌊0.8·terminal⌋ laid over the grid.
pub fn menu_rect(width: u16, height: u16) -> Rect {
    let w = width * 8 / 10;
    let h = height * 8 / 10;
    Rect::new((width - w) / 2, (height - h) / 2, w, h)
}
