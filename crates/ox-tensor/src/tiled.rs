use crate::element::Element;
use crate::shape::Shape;

/// Upper bound on elements per tile.
pub const MAX_TILE_SIZE: usize = 65_536;

/// Picks the tile size for an array of the given shape.
///
/// Tiles cover whole trailing rows where possible: the tile size is the
/// product of trailing dimensions that fits under [`MAX_TILE_SIZE`]. A
/// single oversized trailing dimension falls back to the cap.
pub fn tile_size_for(shape: &Shape) -> usize {
    let numel = shape.numel();
    if numel == 0 {
        return 1;
    }
    let mut size = 1usize;
    for &dim in shape.dims().iter().rev() {
        let next = size * dim;
        if next > MAX_TILE_SIZE {
            break;
        }
        size = next;
    }
    if size == 1 {
        size = numel.min(MAX_TILE_SIZE);
    }
    size
}

/// Element storage split into fixed-capacity contiguous tiles.
///
/// Invariant: `tile_size * tile_count() >= len`. Element `i` lives at
/// `(i / tile_size, i % tile_size)`; the tail of the last tile is padding.
#[derive(Debug, Clone)]
pub struct TiledArray<T> {
    tiles: Vec<Box<[T]>>,
    tile_size: usize,
    len: usize,
}

impl<T: Element> TiledArray<T> {
    /// Zero-filled storage for `len` elements.
    pub fn zeros(len: usize, tile_size: usize) -> Self {
        let tile_size = tile_size.max(1);
        let tiles = (0..len.div_ceil(tile_size))
            .map(|_| vec![T::default(); tile_size].into_boxed_slice())
            .collect();
        TiledArray {
            tiles,
            tile_size,
            len,
        }
    }

    /// Splits `data` into tiles of `tile_size`, padding the last one.
    pub fn from_vec(data: Vec<T>, tile_size: usize) -> Self {
        let tile_size = tile_size.max(1);
        let len = data.len();
        let tiles = data
            .chunks(tile_size)
            .map(|chunk| {
                let mut tile = vec![T::default(); tile_size];
                tile[..chunk.len()].copy_from_slice(chunk);
                tile.into_boxed_slice()
            })
            .collect();
        TiledArray {
            tiles,
            tile_size,
            len,
        }
    }

    /// Logical element count, excluding tile padding.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[Box<[T]>] {
        &self.tiles
    }

    /// Maps a flat element index to `(tile, offset_in_tile)`.
    pub fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.tile_size, index % self.tile_size)
    }

    /// # Panics
    /// Panics if `index >= len()`.
    pub fn get(&self, index: usize) -> T {
        assert!(index < self.len, "index {} out of range {}", index, self.len);
        let (tile, offset) = self.locate(index);
        self.tiles[tile][offset]
    }

    /// # Panics
    /// Panics if `index >= len()`.
    pub fn set(&mut self, index: usize, value: T) {
        assert!(index < self.len, "index {} out of range {}", index, self.len);
        let (tile, offset) = self.locate(index);
        self.tiles[tile][offset] = value;
    }

    /// Visits `[start, start + len)` as contiguous slices, one per tile
    /// touched. The callback receives the position of the slice within the
    /// range.
    pub fn for_each_chunk(&self, start: usize, len: usize, mut f: impl FnMut(usize, &[T])) {
        debug_assert!(start + len <= self.len);
        let mut done = 0;
        while done < len {
            let (tile, offset) = self.locate(start + done);
            let n = (self.tile_size - offset).min(len - done);
            f(done, &self.tiles[tile][offset..offset + n]);
            done += n;
        }
    }

    /// Mutable counterpart of [`TiledArray::for_each_chunk`].
    pub fn for_each_chunk_mut(
        &mut self,
        start: usize,
        len: usize,
        mut f: impl FnMut(usize, &mut [T]),
    ) {
        debug_assert!(start + len <= self.len);
        let mut done = 0;
        while done < len {
            let (tile, offset) = self.locate(start + done);
            let n = (self.tile_size - offset).min(len - done);
            f(done, &mut self.tiles[tile][offset..offset + n]);
            done += n;
        }
    }

    /// Walks `self[start..start + len]` and `src[src_start..src_start + len]`
    /// in lockstep, splitting wherever either side crosses a tile boundary.
    pub fn zip_with<U: Element>(
        &mut self,
        start: usize,
        src: &TiledArray<U>,
        src_start: usize,
        len: usize,
        mut f: impl FnMut(&mut [T], &[U]),
    ) {
        debug_assert!(start + len <= self.len && src_start + len <= src.len);
        let mut done = 0;
        while done < len {
            let (dt, doff) = self.locate(start + done);
            let (st, soff) = src.locate(src_start + done);
            let n = (self.tile_size - doff)
                .min(src.tile_size - soff)
                .min(len - done);
            f(
                &mut self.tiles[dt][doff..doff + n],
                &src.tiles[st][soff..soff + n],
            );
            done += n;
        }
    }

    /// Copies `[start, start + dst.len())` into `dst`.
    pub fn read_into(&self, start: usize, dst: &mut [T]) {
        self.for_each_chunk(start, dst.len(), |pos, chunk| {
            dst[pos..pos + chunk.len()].copy_from_slice(chunk);
        });
    }

    /// Copies `src` into `[start, start + src.len())`.
    pub fn write_from(&mut self, start: usize, src: &[T]) {
        self.for_each_chunk_mut(start, src.len(), |pos, chunk| {
            let n = chunk.len();
            chunk.copy_from_slice(&src[pos..pos + n]);
        });
    }

    pub fn fill_range(&mut self, start: usize, len: usize, value: T) {
        self.for_each_chunk_mut(start, len, |_, chunk| chunk.fill(value));
    }
}

/// Walks two read-only ranges in lockstep, splitting at tile boundaries of
/// either array.
pub fn zip_chunks<A: Element, B: Element>(
    a: &TiledArray<A>,
    a_start: usize,
    b: &TiledArray<B>,
    b_start: usize,
    len: usize,
    mut f: impl FnMut(&[A], &[B]),
) {
    debug_assert!(a_start + len <= a.len && b_start + len <= b.len);
    let mut done = 0;
    while done < len {
        let (at, aoff) = a.locate(a_start + done);
        let (bt, boff) = b.locate(b_start + done);
        let n = (a.tile_size - aoff).min(b.tile_size - boff).min(len - done);
        f(&a.tiles[at][aoff..aoff + n], &b.tiles[bt][boff..boff + n]);
        done += n;
    }
}
