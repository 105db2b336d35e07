//! Routing of elements to the main file or its split siblings.

use std::io::Write;

use super::XmlWriter;
use crate::error::Result;

/// Which file an element belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    Main,
    Materials,
    Volumes,
    Geometry,
}

impl OutputTarget {
    /// Split targets, in the order the main file includes them.
    pub const SPLIT: [OutputTarget; 3] = [
        OutputTarget::Materials,
        OutputTarget::Volumes,
        OutputTarget::Geometry,
    ];

    /// Filename suffix used for split files.
    pub fn suffix(self) -> &'static str {
        match self {
            OutputTarget::Main => "",
            OutputTarget::Materials => "-materials",
            OutputTarget::Volumes => "-volumes",
            OutputTarget::Geometry => "-geometry",
        }
    }
}

/// The set of XML writers for one session.
///
/// Targets without their own writer fall back to the main file, so an
/// unsplit session simply has a single entry.
pub struct XmlOutputs<W: Write> {
    writers: Vec<(OutputTarget, XmlWriter<W>)>,
}

impl<W: Write> XmlOutputs<W> {
    /// Everything goes to one file.
    pub fn single(main: W) -> Self {
        Self {
            writers: vec![(OutputTarget::Main, XmlWriter::new(main))],
        }
    }

    /// Main file plus dedicated writers for some targets.
    pub fn split(main: W, others: Vec<(OutputTarget, W)>) -> Self {
        let mut writers = vec![(OutputTarget::Main, XmlWriter::new(main))];
        writers.extend(
            others
                .into_iter()
                .filter(|(target, _)| *target != OutputTarget::Main)
                .map(|(target, out)| (target, XmlWriter::new(out))),
        );
        Self { writers }
    }

    /// Targets that have their own file, main first.
    pub fn targets(&self) -> Vec<OutputTarget> {
        self.writers.iter().map(|(t, _)| *t).collect()
    }

    pub fn is_split(&self) -> bool {
        self.writers.len() > 1
    }

    /// The writer an element for `target` should go to.
    pub fn writer(&mut self, target: OutputTarget) -> &mut XmlWriter<W> {
        let index = self
            .writers
            .iter()
            .position(|(t, _)| *t == target)
            .unwrap_or(0);
        &mut self.writers[index].1
    }

    /// Finish every writer, in order, returning the inner outputs.
    pub fn finish(self) -> Result<Vec<(OutputTarget, W)>> {
        self.writers
            .into_iter()
            .map(|(target, writer)| Ok((target, writer.finish()?)))
            .collect()
    }

    /// Close and flush every writer regardless of state.
    pub fn abort(self) {
        for (target, writer) in self.writers {
            if let Err(err) = writer.abort() {
                log::warn!("failed to flush {:?} output: {}", target, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_routes_to_main() {
        let mut outputs = XmlOutputs::single(Vec::new());
        outputs.writer(OutputTarget::Geometry).empty("a", &[]).unwrap();
        outputs.writer(OutputTarget::Main).empty("b", &[]).unwrap();
        let files = outputs.finish().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(String::from_utf8(files[0].1.clone()).unwrap(), "<a/>\n<b/>\n");
    }

    #[test]
    fn test_split_routes_by_target() {
        let mut outputs = XmlOutputs::split(
            Vec::new(),
            vec![(OutputTarget::Materials, Vec::new())],
        );
        assert!(outputs.is_split());
        outputs.writer(OutputTarget::Materials).empty("bsdf", &[]).unwrap();
        outputs.writer(OutputTarget::Volumes).empty("medium", &[]).unwrap();
        let files = outputs.finish().unwrap();
        assert_eq!(files[0].0, OutputTarget::Main);
        assert_eq!(String::from_utf8(files[0].1.clone()).unwrap(), "<medium/>\n");
        assert_eq!(String::from_utf8(files[1].1.clone()).unwrap(), "<bsdf/>\n");
    }
}
