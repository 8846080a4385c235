/// 定长环形缓冲区，写满后覆盖最旧的元素
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    read: usize,
    write: usize,
    full: bool,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// 容量至少为 1
    pub fn new(size: usize) -> Self {
        RingBuffer {
            buf: vec![T::default(); size.max(1)],
            read: 0,
            write: 0,
            full: false,
        }
    }

    pub fn push_overwrite(&mut self, item: T) {
        self.buf[self.write] = item;
        self.write = (self.write + 1) % self.buf.len();
        if self.full {
            self.read = self.write;
        } else if self.write == self.read {
            self.full = true;
        }
    }

    /// 按从旧到新的顺序复制全部元素，不消费
    pub fn snapshot(&self) -> Vec<T> {
        (0..self.len())
            .map(|i| self.buf[(self.read + i) % self.buf.len()])
            .collect()
    }

    /// 最新写入的元素
    pub fn last(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let idx = (self.write + self.buf.len() - 1) % self.buf.len();
        Some(self.buf[idx])
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.read == self.write
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.buf.len()
        } else {
            (self.write + self.buf.len() - self.read) % self.buf.len()
        }
    }
}
