use super::item::StudyItem;
use super::lesson::Lesson;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Course1,
    Course2,
    /// Only used in strict mode, for notes with no numeric lesson.
    Unclassified,
}

impl Bucket {
    pub fn name(self) -> &'static str {
        match self {
            Bucket::Course1 => "course1",
            Bucket::Course2 => "course2",
            Bucket::Unclassified => "unclassified",
        }
    }
}

/// Lessons up to and including `threshold` go to course 1.
pub fn route(lesson: &Lesson, threshold: u32, strict: bool) -> Bucket {
    let number = match lesson.number() {
        Some(n) => n,
        None if strict => return Bucket::Unclassified,
        None => lesson.number_or_default(),
    };
    if number <= threshold {
        Bucket::Course1
    } else {
        Bucket::Course2
    }
}

#[derive(Debug, Default)]
pub struct Buckets {
    pub course1: Vec<StudyItem>,
    pub course2: Vec<StudyItem>,
    pub unclassified: Vec<StudyItem>,
    max_lesson: [Option<u32>; 3],
}

impl Buckets {
    fn slot(bucket: Bucket) -> usize {
        match bucket {
            Bucket::Course1 => 0,
            Bucket::Course2 => 1,
            Bucket::Unclassified => 2,
        }
    }

    pub fn push(&mut self, bucket: Bucket, lesson: Option<u32>, item: StudyItem) {
        let slot = &mut self.max_lesson[Self::slot(bucket)];
        if let Some(n) = lesson {
            *slot = Some(slot.map_or(n, |m| m.max(n)));
        }
        match bucket {
            Bucket::Course1 => self.course1.push(item),
            Bucket::Course2 => self.course2.push(item),
            Bucket::Unclassified => self.unclassified.push(item),
        }
    }

    pub fn get(&self, bucket: Bucket) -> &[StudyItem] {
        match bucket {
            Bucket::Course1 => &self.course1,
            Bucket::Course2 => &self.course2,
            Bucket::Unclassified => &self.unclassified,
        }
    }

    /// Highest numeric lesson routed to `bucket`.
    pub fn max_lesson(&self, bucket: Bucket) -> Option<u32> {
        self.max_lesson[Self::slot(bucket)]
    }

    pub fn total(&self) -> usize {
        self.course1.len() + self.course2.len() + self.unclassified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_threshold() {
        assert_eq!(route(&Lesson::Numbered(25), 25, false), Bucket::Course1);
        assert_eq!(route(&Lesson::Numbered(26), 25, false), Bucket::Course2);
        assert_eq!(route(&Lesson::Numbered(0), 25, false), Bucket::Course1);
        assert_eq!(route(&Lesson::Numbered(26), 30, false), Bucket::Course1);
    }

    #[test]
    fn partition_is_total_and_disjoint() {
        for n in 0..=120 {
            let b = route(&Lesson::Numbered(n), 25, false);
            assert_ne!(b, Bucket::Unclassified);
            assert_eq!(n <= 25, b == Bucket::Course1);
        }
    }

    #[test]
    fn unresolved_lesson_lenient_vs_strict() {
        let l = Lesson::Unresolved { parse_failed: true };
        assert_eq!(route(&l, 25, false), Bucket::Course1);
        assert_eq!(route(&l, 25, true), Bucket::Unclassified);

        let tagged = Lesson::Tagged {
            label: "Lesson 40".into(),
            number: Some(40),
        };
        assert_eq!(route(&tagged, 25, true), Bucket::Course2);
    }

    #[test]
    fn tracks_highest_lesson() {
        let item = StudyItem {
            front: "a".into(),
            reading: String::new(),
            back: "b".into(),
            topic: "Lesson 30".into(),
        };
        let mut b = Buckets::default();
        b.push(Bucket::Course2, Some(30), item.clone());
        b.push(Bucket::Course2, Some(48), item.clone());
        b.push(Bucket::Course2, None, item);
        assert_eq!(b.max_lesson(Bucket::Course2), Some(48));
        assert_eq!(b.max_lesson(Bucket::Course1), None);
        assert_eq!(b.get(Bucket::Course2).len(), 3);
        assert_eq!(b.total(), 3);
    }
}
