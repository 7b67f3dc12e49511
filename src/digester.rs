//! Grammar-driven incremental decoder.
//!
//! A [`Digester`] walks BER input one chunk at a time. Every TLV is matched
//! against the grammar through a stack of frames (one per open constructed
//! value) and the grammar builds its objects on an [`ObjectStack`] through the
//! `tag`, `length`, `value` and `finish` callbacks. When the outermost TLV of a
//! PDU closes, [`Grammar::complete`] turns the stack into a message that is
//! handed to the [`MessageHandler`].
//!
//! All decoder state lives in the `Digester`, so `decode` can stop at any byte
//! and resume with the next chunk.

use std::fmt;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::accumulator::Accumulator;
use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::tlv::{self, Length, Tag};

/// Where a matched child goes and which state its parent moves to once the
/// child has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<R> {
    pub rule: R,
    pub next_state: u8,
}

impl<R> Transition<R> {
    pub fn new(rule: R, next_state: u8) -> Self {
        Self { rule, next_state }
    }
}

/// A protocol grammar: a static dispatch table plus object-building callbacks.
///
/// `state` is the per-construct position (which child is expected next). It
/// starts at 0 and becomes the matched transition's `next_state` after each
/// child finishes.
pub trait Grammar {
    type Rule: Copy + fmt::Debug;
    type Object;
    type Message;

    /// Rule for the outermost TLV of a PDU, or `None` if `tag` cannot start one.
    fn root(&self, tag: Tag) -> Option<Self::Rule>;

    /// Rule for a child with `tag` inside `parent` at `state`.
    fn child(&self, parent: Self::Rule, state: u8, tag: Tag) -> Option<Transition<Self::Rule>>;

    /// Tolerant rules skip children they do not know instead of failing.
    fn is_tolerant(&self, _rule: Self::Rule) -> bool {
        false
    }

    fn tag(
        &self,
        _rule: Self::Rule,
        _tag: Tag,
        _objects: &mut ObjectStack<Self::Object>,
    ) -> Result<(), DecodeError> {
        Ok(())
    }

    fn length(
        &self,
        _rule: Self::Rule,
        _length: Length,
        _objects: &mut ObjectStack<Self::Object>,
    ) -> Result<(), DecodeError> {
        Ok(())
    }

    /// Content octets of a primitive TLV.
    fn value(
        &self,
        _rule: Self::Rule,
        _value: Bytes,
        _objects: &mut ObjectStack<Self::Object>,
    ) -> Result<(), DecodeError> {
        Ok(())
    }

    /// The TLV and all of its descendants have been read. `state` is the
    /// final grammar state of the construct (0 for primitives).
    fn finish(
        &self,
        _rule: Self::Rule,
        _state: u8,
        _objects: &mut ObjectStack<Self::Object>,
    ) -> Result<(), DecodeError> {
        Ok(())
    }

    /// Build the message once the PDU has closed.
    fn complete(&self, objects: &mut ObjectStack<Self::Object>) -> Result<Self::Message, DecodeError>;
}

/// Receives decode results in arrival order.
pub trait MessageHandler<M> {
    fn on_message_decoded(&mut self, message: M);

    fn on_decode_error(&mut self, error: &DecodeError) {
        warn!("Dropping PDU: {}", error);
    }
}

/// Handler that keeps everything it is given.
#[derive(Debug)]
pub struct CollectingHandler<M> {
    pub messages: Vec<M>,
    pub errors: Vec<DecodeError>,
}

impl<M> Default for CollectingHandler<M> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<M> CollectingHandler<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M, H: MessageHandler<M> + ?Sized> MessageHandler<M> for &mut H {
    fn on_message_decoded(&mut self, message: M) {
        (**self).on_message_decoded(message);
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        (**self).on_decode_error(error);
    }
}

impl<M> MessageHandler<M> for CollectingHandler<M> {
    fn on_message_decoded(&mut self, message: M) {
        self.messages.push(message);
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        self.errors.push(error.clone());
    }
}

/// In-progress objects. Rules that push on `tag` pop on `finish` and hand the
/// result to whatever is on top afterwards.
#[derive(Debug)]
pub struct ObjectStack<O> {
    objects: Vec<O>,
}

impl<O> Default for ObjectStack<O> {
    fn default() -> Self {
        Self { objects: Vec::new() }
    }
}

impl<O> ObjectStack<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: O) {
        self.objects.push(object);
    }

    pub fn pop(&mut self) -> Option<O> {
        self.objects.pop()
    }

    pub fn top(&self) -> Option<&O> {
        self.objects.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut O> {
        self.objects.last_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

/// One open constructed TLV.
#[derive(Debug, Clone)]
pub struct Frame<R> {
    /// `None` when the subtree is being skipped.
    pub rule: Option<R>,
    pub tag: Tag,
    pub state: u8,
    /// Absolute stream offset where a definite-length value ends.
    pub end: Option<u64>,
    /// State the parent moves to when this frame finishes.
    pub parent_next: u8,
}

#[derive(Debug)]
pub struct RuleStack<R> {
    frames: Vec<Frame<R>>,
}

impl<R> Default for RuleStack<R> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<R> RuleStack<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame<R>) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame<R>> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame<R>> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame<R>> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Turn every open frame into a skipped one.
    fn ignore_all(&mut self) {
        for frame in &mut self.frames {
            frame.rule = None;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target<R> {
    Rule(Transition<R>),
    Ignore,
    EndOfContents,
}

#[derive(Debug, Clone, Copy)]
enum ReadState<R> {
    Tag,
    Length { tag: Tag, target: Target<R> },
    Value { transition: Transition<R>, length: usize },
    Skip { remaining: usize },
}

/// Resumable BER decoder for one grammar and one byte stream.
pub struct Digester<G: Grammar> {
    grammar: G,
    config: DecoderConfig,
    rules: RuleStack<G::Rule>,
    objects: ObjectStack<G::Object>,
    state: ReadState<G::Rule>,
    /// Tag or length octets split across chunks.
    header: BytesMut,
    accumulator: Accumulator,
    /// Absolute offset of the next unread byte.
    offset: u64,
    pdu_start: u64,
    /// Set once the current PDU has failed; the rest of it is skipped.
    aborted: bool,
}

impl<G: Grammar> Digester<G> {
    pub fn new(grammar: G) -> Self {
        Self::with_config(grammar, DecoderConfig::default())
    }

    pub fn with_config(grammar: G, config: DecoderConfig) -> Self {
        Self {
            grammar,
            config,
            rules: RuleStack::new(),
            objects: ObjectStack::new(),
            state: ReadState::Tag,
            header: BytesMut::with_capacity(16),
            accumulator: Accumulator::new(),
            offset: 0,
            pdu_start: 0,
            aborted: false,
        }
    }

    pub fn grammar(&self) -> &G {
        &self.grammar
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Bytes consumed since the decoder was created.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// True between PDUs.
    pub fn is_idle(&self) -> bool {
        self.rules.is_empty() && matches!(self.state, ReadState::Tag) && self.header.is_empty()
    }

    /// Bytes of the PDU currently in progress.
    pub fn pending_bytes(&self) -> u64 {
        if self.is_idle() {
            0
        } else {
            self.offset - self.pdu_start
        }
    }

    /// Drop any partial PDU.
    pub fn reset(&mut self) {
        self.rules.clear();
        self.objects.clear();
        self.state = ReadState::Tag;
        self.header.clear();
        self.accumulator.clear();
        self.aborted = false;
    }

    /// Feed one chunk. Complete PDUs are reported to `handler` as they close;
    /// a trailing partial PDU stays buffered until the next call.
    ///
    /// Returns `Err` only for framing errors, after which the decoder has been
    /// reset and the stream should be abandoned.
    pub fn decode<H>(&mut self, chunk: Bytes, handler: &mut H) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        let result = self.decode_inner(&chunk, handler);
        if let Err(e) = &result {
            debug!("Framing error at byte {}, resetting decoder: {}", self.offset, e);
            self.reset();
        }
        result
    }

    fn decode_inner<H>(&mut self, chunk: &Bytes, handler: &mut H) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        let mut pos = 0usize;
        loop {
            self.close_finished_frames(handler)?;
            if !self.is_idle() && self.offset - self.pdu_start > self.config.max_pdu_size as u64 {
                return Err(DecodeError::malformed(
                    self.offset,
                    format!("PDU exceeds {} bytes", self.config.max_pdu_size),
                ));
            }
            if pos == chunk.len() {
                return Ok(());
            }

            match self.state {
                ReadState::Tag => {
                    if self.is_idle() {
                        self.pdu_start = self.offset;
                    }
                    let start = self.offset - self.header.len() as u64;
                    let Some(tag) = self.read_header(chunk, &mut pos, tlv::read_tag)? else {
                        continue;
                    };
                    let target = self.dispatch(tag, start, handler)?;
                    self.state = ReadState::Length { tag, target };
                }
                ReadState::Length { tag, target } => {
                    let Some(length) = self.read_header(chunk, &mut pos, tlv::read_length)? else {
                        continue;
                    };
                    self.on_length(tag, target, length, handler)?;
                }
                ReadState::Value { transition, length } => {
                    let available = chunk.len() - pos;
                    let value = if self.accumulator.is_empty() && available >= length {
                        let value = chunk.slice(pos..pos + length);
                        pos += length;
                        self.offset += length as u64;
                        value
                    } else {
                        let take = self.accumulator.missing(length).min(available);
                        self.accumulator.feed(&chunk[pos..pos + take]);
                        pos += take;
                        self.offset += take as u64;
                        if !self.accumulator.is_satisfied(length) {
                            continue;
                        }
                        self.accumulator.drain()
                    };
                    self.state = ReadState::Tag;
                    self.deliver_value(transition, value, handler);
                }
                ReadState::Skip { remaining } => {
                    let take = remaining.min(chunk.len() - pos);
                    pos += take;
                    self.offset += take as u64;
                    if take < remaining {
                        self.state = ReadState::Skip {
                            remaining: remaining - take,
                        };
                        continue;
                    }
                    self.state = ReadState::Tag;
                    if self.rules.is_empty() {
                        self.end_pdu();
                    }
                }
            }
        }
    }

    /// Parse a tag or length, buffering partial headers across chunks.
    fn read_header<T, F>(&mut self, chunk: &[u8], pos: &mut usize, parse: F) -> Result<Option<T>, DecodeError>
    where
        F: Fn(&[u8]) -> Result<Option<(T, usize)>, DecodeError>,
    {
        if self.header.is_empty() {
            let rest = &chunk[*pos..];
            return match parse(rest).map_err(|e| e.rebase(self.offset))? {
                Some((value, used)) => {
                    *pos += used;
                    self.offset += used as u64;
                    Ok(Some(value))
                }
                None => {
                    self.header.extend_from_slice(rest);
                    *pos = chunk.len();
                    self.offset += rest.len() as u64;
                    Ok(None)
                }
            };
        }

        let header_start = self.offset - self.header.len() as u64;
        while *pos < chunk.len() {
            self.header.extend_from_slice(&chunk[*pos..*pos + 1]);
            *pos += 1;
            self.offset += 1;
            if let Some((value, _)) = parse(&self.header).map_err(|e| e.rebase(header_start))? {
                self.header.clear();
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Match a freshly read tag against the open frame and fire `tag`.
    fn dispatch<H>(&mut self, tag: Tag, start: u64, handler: &mut H) -> Result<Target<G::Rule>, DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        if tag.is_end_of_contents() {
            return match self.rules.top() {
                Some(frame) if frame.end.is_none() => Ok(Target::EndOfContents),
                _ => Err(DecodeError::malformed(
                    start,
                    "end-of-contents outside an indefinite-length value",
                )),
            };
        }

        let open = self.rules.top().map(|frame| (frame.rule, frame.state));
        let transition = match open {
            None => match self.grammar.root(tag) {
                Some(rule) => Transition::new(rule, 0),
                None => {
                    self.abort(
                        DecodeError::UnexpectedTag {
                            offset: start,
                            tag,
                            context: "PDU".to_string(),
                        },
                        handler,
                    );
                    return Ok(Target::Ignore);
                }
            },
            Some((None, _)) => return Ok(Target::Ignore),
            Some((Some(parent), state)) => match self.grammar.child(parent, state, tag) {
                Some(transition) => transition,
                None if self.grammar.is_tolerant(parent) => {
                    debug!("Skipping unknown {} inside {:?}", tag, parent);
                    return Ok(Target::Ignore);
                }
                None => {
                    self.abort(
                        DecodeError::UnexpectedTag {
                            offset: start,
                            tag,
                            context: format!("{:?} (state {})", parent, state),
                        },
                        handler,
                    );
                    return Ok(Target::Ignore);
                }
            },
        };

        trace!("{} -> {:?}", tag, transition.rule);
        match self.grammar.tag(transition.rule, tag, &mut self.objects) {
            Ok(()) => Ok(Target::Rule(transition)),
            Err(e) => {
                self.abort(e, handler);
                Ok(Target::Ignore)
            }
        }
    }

    fn on_length<H>(
        &mut self,
        tag: Tag,
        target: Target<G::Rule>,
        length: Length,
        handler: &mut H,
    ) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        self.state = ReadState::Tag;

        if let Target::EndOfContents = target {
            if length != Length::Definite(0) {
                return Err(DecodeError::malformed(
                    self.offset,
                    "end-of-contents with non-zero length",
                ));
            }
            return self.close_frame(handler);
        }

        let end = length.definite().map(|n| self.offset + n as u64);
        if let (Some(end), Some(parent_end)) = (end, self.rules.top().and_then(|f| f.end)) {
            if end > parent_end {
                return Err(DecodeError::malformed(
                    self.offset,
                    format!("{} overruns its parent by {} bytes", tag, end - parent_end),
                ));
            }
        }
        if let (true, Some(end)) = (self.rules.is_empty(), end) {
            if end - self.pdu_start > self.config.max_pdu_size as u64 {
                return Err(DecodeError::malformed(
                    self.pdu_start,
                    format!(
                        "PDU of {} bytes exceeds limit of {}",
                        end - self.pdu_start,
                        self.config.max_pdu_size
                    ),
                ));
            }
        }

        let mut transition = match target {
            Target::Rule(t) => Some(t),
            _ => None,
        };
        if let Some(t) = transition {
            if let Err(e) = self.grammar.length(t.rule, length, &mut self.objects) {
                self.abort(e, handler);
                transition = None;
            }
        }

        match (tag.is_constructed(), transition, length) {
            (false, _, Length::Indefinite) => {
                return Err(DecodeError::malformed(
                    self.offset,
                    format!("indefinite length on primitive {}", tag),
                ));
            }
            (false, Some(transition), Length::Definite(0)) => {
                self.deliver_value(transition, Bytes::new(), handler);
            }
            (false, Some(transition), Length::Definite(n)) => {
                self.state = ReadState::Value {
                    transition,
                    length: n,
                };
            }
            (_, None, Length::Definite(0)) => {
                if self.rules.is_empty() {
                    self.end_pdu();
                }
            }
            (_, None, Length::Definite(n)) => {
                self.state = ReadState::Skip { remaining: n };
            }
            (true, transition, length) => {
                if self.rules.depth() >= self.config.max_depth {
                    return Err(DecodeError::malformed(
                        self.offset,
                        format!("nesting deeper than {}", self.config.max_depth),
                    ));
                }
                self.rules.push(Frame {
                    rule: transition.map(|t| t.rule),
                    tag,
                    state: 0,
                    end: length.definite().map(|n| self.offset + n as u64),
                    parent_next: transition.map_or(0, |t| t.next_state),
                });
            }
        }
        Ok(())
    }

    /// Hand a complete primitive value to the grammar and finish it.
    fn deliver_value<H>(&mut self, transition: Transition<G::Rule>, value: Bytes, handler: &mut H)
    where
        H: MessageHandler<G::Message>,
    {
        let rule = transition.rule;
        let result = self
            .grammar
            .value(rule, value, &mut self.objects)
            .and_then(|()| self.grammar.finish(rule, 0, &mut self.objects));
        match result {
            Ok(()) => match self.rules.top_mut() {
                Some(parent) => {
                    if parent.rule.is_some() {
                        parent.state = transition.next_state;
                    }
                }
                None => self.complete_pdu(handler),
            },
            Err(e) => {
                self.abort(e, handler);
                if self.rules.is_empty() {
                    self.end_pdu();
                }
            }
        }
    }

    /// Close every definite-length frame whose content has been consumed.
    fn close_finished_frames<H>(&mut self, handler: &mut H) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        if !matches!(self.state, ReadState::Tag) || !self.header.is_empty() {
            return Ok(());
        }
        while let Some(end) = self.rules.top().and_then(|f| f.end) {
            if self.offset < end {
                break;
            }
            if self.offset > end {
                return Err(DecodeError::malformed(end, "child TLV overruns its parent"));
            }
            self.close_frame(handler)?;
        }
        Ok(())
    }

    fn close_frame<H>(&mut self, handler: &mut H) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        let Some(frame) = self.rules.pop() else {
            return Ok(());
        };
        if let Some(parent_end) = self.rules.top().and_then(|f| f.end) {
            if self.offset > parent_end {
                return Err(DecodeError::malformed(parent_end, "child TLV overruns its parent"));
            }
        }
        if let Some(rule) = frame.rule {
            if let Err(e) = self.grammar.finish(rule, frame.state, &mut self.objects) {
                self.abort(e, handler);
            } else if let Some(parent) = self.rules.top_mut() {
                if parent.rule.is_some() {
                    parent.state = frame.parent_next;
                }
            }
        }
        if self.rules.is_empty() {
            self.complete_pdu(handler);
        }
        Ok(())
    }

    fn complete_pdu<H>(&mut self, handler: &mut H)
    where
        H: MessageHandler<G::Message>,
    {
        if !self.aborted {
            match self.grammar.complete(&mut self.objects) {
                Ok(message) => {
                    trace!("PDU of {} bytes decoded", self.offset - self.pdu_start);
                    handler.on_message_decoded(message);
                }
                Err(e) => handler.on_decode_error(&e),
            }
        }
        self.end_pdu();
    }

    fn end_pdu(&mut self) {
        self.objects.clear();
        self.aborted = false;
    }

    /// Report a message-level failure and skip the rest of the PDU.
    fn abort<H>(&mut self, error: DecodeError, handler: &mut H)
    where
        H: MessageHandler<G::Message>,
    {
        if !self.aborted {
            handler.on_decode_error(&error);
        }
        self.aborted = true;
        self.objects.clear();
        self.rules.ignore_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::decode_integer;
    use crate::tlv::Class;

    /// SEQUENCE OF INTEGER, with a tolerant `[0]` group that may hold more
    /// integers. The value 13 is refused.
    struct Numbers;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Rule {
        List,
        Group,
        Number,
    }

    const GROUP: Tag = Tag::constructed(Class::Context, 0);

    impl Grammar for Numbers {
        type Rule = Rule;
        type Object = Vec<i64>;
        type Message = Vec<i64>;

        fn root(&self, tag: Tag) -> Option<Rule> {
            (tag == Tag::SEQUENCE).then_some(Rule::List)
        }

        fn child(&self, parent: Rule, state: u8, tag: Tag) -> Option<Transition<Rule>> {
            match (parent, tag) {
                (Rule::List, Tag::INTEGER) => Some(Transition::new(Rule::Number, state)),
                (Rule::List, GROUP) => Some(Transition::new(Rule::Group, state + 1)),
                (Rule::Group, Tag::INTEGER) => Some(Transition::new(Rule::Number, state)),
                _ => None,
            }
        }

        fn is_tolerant(&self, rule: Rule) -> bool {
            rule == Rule::Group
        }

        fn tag(&self, rule: Rule, _tag: Tag, objects: &mut ObjectStack<Vec<i64>>) -> Result<(), DecodeError> {
            if rule == Rule::List {
                objects.push(Vec::new());
            }
            Ok(())
        }

        fn value(&self, _rule: Rule, value: Bytes, objects: &mut ObjectStack<Vec<i64>>) -> Result<(), DecodeError> {
            let n = decode_integer(&value).map_err(|e| DecodeError::constraint("Numbers", "n", e))?;
            if n == 13 {
                return Err(DecodeError::constraint("Numbers", "n", "unlucky"));
            }
            objects
                .top_mut()
                .ok_or_else(|| DecodeError::missing("Numbers", "list"))?
                .push(n);
            Ok(())
        }

        fn finish(&self, rule: Rule, state: u8, _objects: &mut ObjectStack<Vec<i64>>) -> Result<(), DecodeError> {
            if rule == Rule::List && state > 1 {
                return Err(DecodeError::constraint("Numbers", "group", "at most one group"));
            }
            Ok(())
        }

        fn complete(&self, objects: &mut ObjectStack<Vec<i64>>) -> Result<Vec<i64>, DecodeError> {
            objects.pop().ok_or_else(|| DecodeError::missing("Numbers", "list"))
        }
    }

    fn decode_all(input: &[u8]) -> (CollectingHandler<Vec<i64>>, Result<(), DecodeError>) {
        let mut digester = Digester::new(Numbers);
        let mut handler = CollectingHandler::new();
        let result = digester.decode(Bytes::copy_from_slice(input), &mut handler);
        (handler, result)
    }

    const LIST: [u8; 8] = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];

    #[test]
    fn test_single_chunk() {
        let (handler, result) = decode_all(&LIST);
        result.unwrap();
        assert_eq!(handler.messages, vec![vec![1, 2]]);
        assert!(handler.errors.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut digester = Digester::new(Numbers);
        let mut handler = CollectingHandler::new();
        for b in LIST.iter().chain(LIST.iter()) {
            digester.decode(Bytes::copy_from_slice(&[*b]), &mut handler).unwrap();
        }
        assert_eq!(handler.messages, vec![vec![1, 2], vec![1, 2]]);
        assert!(digester.is_idle());
        assert_eq!(digester.offset(), 16);
    }

    #[test]
    fn test_partial_pdu_is_buffered() {
        let mut digester = Digester::new(Numbers);
        let mut handler = CollectingHandler::new();
        digester.decode(Bytes::copy_from_slice(&LIST[..5]), &mut handler).unwrap();
        assert!(handler.messages.is_empty());
        assert_eq!(digester.pending_bytes(), 5);
        digester.decode(Bytes::copy_from_slice(&LIST[5..]), &mut handler).unwrap();
        assert_eq!(handler.messages, vec![vec![1, 2]]);
        assert_eq!(digester.pending_bytes(), 0);
    }

    #[test]
    fn test_indefinite_length() {
        let input = [
            0x30, 0x80, 0x02, 0x01, 0x07, 0xA0, 0x80, 0x02, 0x01, 0x08, 0x00, 0x00, 0x00, 0x00,
        ];
        let (handler, result) = decode_all(&input);
        result.unwrap();
        assert_eq!(handler.messages, vec![vec![7, 8]]);
    }

    #[test]
    fn test_tolerant_parent_skips_unknown_children() {
        // [0] { BOOLEAN, INTEGER 5, OCTET STRING (indefinite constructed) }
        let input = [
            0x30, 0x0F, 0xA0, 0x0D, 0x01, 0x01, 0xFF, 0x02, 0x01, 0x05, 0x24, 0x80, 0x04, 0x01,
            b'x', 0x00, 0x00,
        ];
        let (handler, result) = decode_all(&input);
        result.unwrap();
        assert!(handler.errors.is_empty(), "{:?}", handler.errors);
        assert_eq!(handler.messages, vec![vec![5]]);
    }

    #[test]
    fn test_strict_parent_rejects_unknown_tag_then_recovers() {
        let mut input = vec![0x30, 0x06, 0x01, 0x01, 0xFF, 0x02, 0x01, 0x03];
        input.extend_from_slice(&LIST);
        let (handler, result) = decode_all(&input);
        result.unwrap();
        assert_eq!(handler.errors.len(), 1);
        assert!(matches!(
            &handler.errors[0],
            DecodeError::UnexpectedTag { offset: 2, tag, .. } if *tag == Tag::BOOLEAN
        ));
        assert_eq!(handler.messages, vec![vec![1, 2]]);
    }

    #[test]
    fn test_unknown_root_is_skipped() {
        let mut input = vec![0x04, 0x02, b'h', b'i'];
        input.extend_from_slice(&LIST);
        let (handler, result) = decode_all(&input);
        result.unwrap();
        assert_eq!(handler.errors.len(), 1);
        assert_eq!(handler.messages, vec![vec![1, 2]]);
    }

    #[test]
    fn test_domain_error_discards_message_only() {
        let mut input = vec![0x30, 0x06, 0x02, 0x01, 0x0D, 0x02, 0x01, 0x02];
        input.extend_from_slice(&LIST);
        let (handler, result) = decode_all(&input);
        result.unwrap();
        assert_eq!(
            handler.errors,
            vec![DecodeError::constraint("Numbers", "n", "unlucky")]
        );
        assert_eq!(handler.messages, vec![vec![1, 2]]);
    }

    #[test]
    fn test_finish_error_uses_final_state() {
        let input = [0x30, 0x04, 0xA0, 0x00, 0xA0, 0x00];
        let (handler, result) = decode_all(&input);
        result.unwrap();
        assert_eq!(handler.errors.len(), 1);
        assert!(handler.messages.is_empty());
    }

    #[test]
    fn test_malformed_returns_error_and_resets() {
        let mut digester = Digester::new(Numbers);
        let mut handler = CollectingHandler::new();
        let err = digester
            .decode(Bytes::from_static(&[0x30, 0xFF, 0x00]), &mut handler)
            .unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEncoding { offset: 1, .. }));
        assert!(digester.is_idle());
        digester.decode(Bytes::copy_from_slice(&LIST), &mut handler).unwrap();
        assert_eq!(handler.messages, vec![vec![1, 2]]);
    }

    #[test]
    fn test_child_overrunning_parent_is_malformed() {
        let (_, result) = decode_all(&[0x30, 0x03, 0x02, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert!(matches!(result, Err(DecodeError::MalformedEncoding { .. })));
    }

    #[test]
    fn test_stray_end_of_contents_is_malformed() {
        let (_, result) = decode_all(&[0x30, 0x02, 0x00, 0x00]);
        assert!(matches!(result, Err(DecodeError::MalformedEncoding { offset: 2, .. })));
    }

    #[test]
    fn test_indefinite_primitive_is_malformed() {
        let (_, result) = decode_all(&[0x30, 0x80, 0x02, 0x80]);
        assert!(matches!(result, Err(DecodeError::MalformedEncoding { .. })));
    }

    #[test]
    fn test_limits() {
        let config = DecoderConfig {
            max_pdu_size: 6,
            max_depth: 64,
        };
        let mut digester = Digester::with_config(Numbers, config);
        let mut handler = CollectingHandler::new();
        assert!(digester.decode(Bytes::copy_from_slice(&LIST), &mut handler).is_err());

        let config = DecoderConfig {
            max_pdu_size: 1024,
            max_depth: 1,
        };
        let mut digester = Digester::with_config(Numbers, config);
        let input = [0x30, 0x02, 0xA0, 0x00];
        assert!(digester.decode(Bytes::copy_from_slice(&input), &mut handler).is_err());
    }

    #[test]
    fn test_value_split_across_chunks_uses_accumulator() {
        let input = [0x30, 0x06, 0x02, 0x04, 0x01, 0x02, 0x03, 0x04];
        let mut digester = Digester::new(Numbers);
        let mut handler = CollectingHandler::new();
        digester.decode(Bytes::copy_from_slice(&input[..5]), &mut handler).unwrap();
        digester.decode(Bytes::copy_from_slice(&input[5..]), &mut handler).unwrap();
        assert_eq!(handler.messages, vec![vec![0x01020304]]);
    }
}
