//! FFmpeg plumbing for one input/output pair.
//!
//! The output always carries the redacted video as stream 0 followed by one
//! re-encoded audio stream per input audio stream, in input order. Video
//! packets stay in the input stream time base up to the encoder; audio is
//! moved to `1/sample_rate` before decoding so the decoder, filter and
//! encoder all share one clock.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use ffmpeg::codec::capabilities::Capabilities;
use ffmpeg::format::context::{Input, Output};
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::{codec, decoder, encoder, filter, format, frame, media, Dictionary, Packet, Rational};
use image::RgbImage;
use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::{TimeBase, VideoFrame};
use plateblur_processing_core::FrameScheduler;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressReporter;

const VIDEO_OUTPUT_INDEX: usize = 0;
const FALLBACK_AUDIO_BIT_RATE: usize = 128_000;

/// `EAGAIN` and end-of-stream both mean "nothing more to pull right now".
fn is_drained(err: &ffmpeg::Error) -> bool {
    matches!(err, ffmpeg::Error::Eof)
        || matches!(err, ffmpeg::Error::Other { errno } if *errno == ffmpeg::util::error::EAGAIN)
}

fn time_base(r: Rational) -> TimeBase {
    TimeBase::new(r.numerator(), r.denominator())
}

fn is_valid_rate(r: Rational) -> bool {
    r.numerator() > 0 && r.denominator() > 0
}

/// Pull every pending packet out of `encoder` and mux it.
fn drain_encoder(
    encoder: &mut encoder::Encoder,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    octx: &mut Output,
) -> PlateblurResult<()> {
    let mut encoded = Packet::empty();
    loop {
        match encoder.receive_packet(&mut encoded) {
            Ok(()) => {
                encoded.set_stream(stream_index);
                encoded.rescale_ts(encoder_time_base, stream_time_base);
                encoded.write_interleaved(octx).map_err(|e| {
                    PlateblurError::mux(format!("failed to write packet for stream {stream_index}: {e}"))
                })?;
            }
            Err(e) if is_drained(&e) => return Ok(()),
            Err(e) => {
                return Err(PlateblurError::encode(format!(
                    "encoder for stream {stream_index} failed: {e}"
                )))
            }
        }
    }
}

fn scaler(
    slot: &mut Option<scaling::Context>,
    src: Pixel,
    dst: Pixel,
    width: u32,
    height: u32,
) -> PlateblurResult<&mut scaling::Context> {
    if slot.is_none() {
        let context = scaling::Context::get(
            src,
            width,
            height,
            dst,
            width,
            height,
            scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| {
            PlateblurError::decode(format!("failed to create {src:?} -> {dst:?} scaler: {e}"))
        })?;
        *slot = Some(context);
    }
    slot.as_mut()
        .ok_or_else(|| PlateblurError::decode("scaler unavailable"))
}

struct VideoLane {
    input_index: usize,
    decoder: decoder::Video,
    encoder: encoder::Video,
    /// Input stream time base; also the encoder time base.
    time_base: Rational,
    /// Output stream time base, known after the header is written.
    output_time_base: Rational,
    to_rgb: Option<scaling::Context>,
    to_yuv: Option<scaling::Context>,
    frames: u64,
    last_pts: Option<i64>,
}

impl VideoLane {
    fn open(ictx: &Input, octx: &mut Output, encoder_name: &str) -> PlateblurResult<(Self, Option<u64>)> {
        let ist = ictx
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| PlateblurError::unsupported_stream("input has no video stream"))?;
        let input_index = ist.index();
        let time_base = ist.time_base();
        let total_frames = u64::try_from(ist.frames()).ok().filter(|&n| n > 0);

        let decoder = codec::context::Context::from_parameters(ist.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| PlateblurError::decode(format!("failed to open video decoder: {e}")))?;
        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(PlateblurError::unsupported_stream(
                "video stream has no frame dimensions",
            ));
        }

        let video_codec = encoder::find_by_name(encoder_name)
            .ok_or_else(|| PlateblurError::encode(format!("video encoder not available: {encoder_name}")))?;
        let global_header = octx
            .format()
            .flags()
            .contains(format::flag::Flags::GLOBAL_HEADER);

        let mut ost = octx
            .add_stream(video_codec)
            .map_err(|e| PlateblurError::mux(format!("failed to add video stream: {e}")))?;
        let mut encoder = codec::context::Context::new_with_codec(video_codec)
            .encoder()
            .video()
            .map_err(|e| PlateblurError::encode(format!("failed to create video encoder: {e}")))?;

        let frame_rate = [ist.avg_frame_rate(), ist.rate()]
            .into_iter()
            .find(|r| is_valid_rate(*r));
        encoder.set_width(decoder.width());
        encoder.set_height(decoder.height());
        encoder.set_aspect_ratio(decoder.aspect_ratio());
        encoder.set_format(Pixel::YUV420P);
        encoder.set_frame_rate(frame_rate);
        encoder.set_time_base(time_base);
        if global_header {
            encoder.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let mut options = Dictionary::new();
        if encoder_name == "libx264" {
            options.set("preset", "medium");
        }
        let encoder = encoder
            .open_with(options)
            .map_err(|e| PlateblurError::encode(format!("failed to open {encoder_name}: {e}")))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        ost.set_metadata(ist.metadata().to_owned());

        tracing::debug!(
            input_stream = input_index,
            width = decoder.width(),
            height = decoder.height(),
            time_base = %time_base,
            frame_rate = ?frame_rate,
            encoder = encoder_name,
            "Video lane opened"
        );

        Ok((
            Self {
                input_index,
                decoder,
                encoder,
                time_base,
                output_time_base: time_base,
                to_rgb: None,
                to_yuv: None,
                frames: 0,
                last_pts: None,
            },
            total_frames,
        ))
    }

    fn send_packet(&mut self, packet: &Packet) -> PlateblurResult<()> {
        self.decoder
            .send_packet(packet)
            .map_err(|e| PlateblurError::decode(format!("video decode failed: {e}")))
    }

    fn receive_frames(
        &mut self,
        scheduler: &mut FrameScheduler<'_>,
        octx: &mut Output,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> PlateblurResult<()> {
        let mut decoded = frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {}
                Err(e) if is_drained(&e) => return Ok(()),
                Err(e) => return Err(PlateblurError::decode(format!("video decode failed: {e}"))),
            }
            if cancel.is_cancelled() {
                return Err(PlateblurError::Cancelled);
            }
            self.process_frame(&decoded, scheduler, octx)?;
            reporter.frame(self.frames);
        }
    }

    fn process_frame(
        &mut self,
        decoded: &frame::Video,
        scheduler: &mut FrameScheduler<'_>,
        octx: &mut Output,
    ) -> PlateblurResult<()> {
        // Frames without a timestamp continue the previous one.
        let pts = decoded
            .timestamp()
            .or_else(|| self.last_pts.map(|p| p + 1));
        self.last_pts = pts;
        self.frames += 1;

        let pixels = self.to_rgb_image(decoded)?;
        let mut video_frame = VideoFrame::new(self.frames, pts, time_base(self.time_base), pixels);
        let outcome = scheduler.process(&mut video_frame)?;
        tracing::trace!(
            frame = outcome.index,
            mode = ?outcome.mode,
            redacted = outcome.redacted,
            "Frame processed"
        );

        let mut yuv = self.to_encoder_frame(&video_frame.pixels)?;
        yuv.set_pts(pts);
        self.encoder
            .send_frame(&yuv)
            .map_err(|e| PlateblurError::encode(format!("video encode failed: {e}")))?;
        drain_encoder(
            &mut self.encoder,
            VIDEO_OUTPUT_INDEX,
            self.time_base,
            self.output_time_base,
            octx,
        )
    }

    fn to_rgb_image(&mut self, decoded: &frame::Video) -> PlateblurResult<RgbImage> {
        let (width, height) = (decoded.width(), decoded.height());
        let scaler = scaler(&mut self.to_rgb, decoded.format(), Pixel::RGB24, width, height)?;
        let mut rgb = frame::Video::new(Pixel::RGB24, width, height);
        scaler
            .run(decoded, &mut rgb)
            .map_err(|e| PlateblurError::decode(format!("failed to convert frame to RGB: {e}")))?;

        let row = width as usize * 3;
        let stride = rgb.stride(0);
        let data = rgb.data(0);
        let mut packed = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            packed.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        RgbImage::from_raw(width, height, packed)
            .ok_or_else(|| PlateblurError::decode("decoded frame has an unexpected size"))
    }

    fn to_encoder_frame(&mut self, pixels: &RgbImage) -> PlateblurResult<frame::Video> {
        let (width, height) = pixels.dimensions();
        let mut rgb = frame::Video::new(Pixel::RGB24, width, height);
        let row = width as usize * 3;
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        for (y, src) in pixels.as_raw().chunks_exact(row).enumerate() {
            data[y * stride..y * stride + row].copy_from_slice(src);
        }

        let format = self.encoder.format();
        let scaler = scaler(&mut self.to_yuv, Pixel::RGB24, format, width, height)?;
        let mut out = frame::Video::new(format, width, height);
        scaler
            .run(&rgb, &mut out)
            .map_err(|e| PlateblurError::encode(format!("failed to convert frame to {format:?}: {e}")))?;
        Ok(out)
    }

    fn flush(
        &mut self,
        scheduler: &mut FrameScheduler<'_>,
        octx: &mut Output,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> PlateblurResult<()> {
        self.decoder
            .send_eof()
            .map_err(|e| PlateblurError::decode(format!("failed to flush video decoder: {e}")))?;
        self.receive_frames(scheduler, octx, reporter, cancel)?;
        self.encoder
            .send_eof()
            .map_err(|e| PlateblurError::encode(format!("failed to flush video encoder: {e}")))?;
        drain_encoder(
            &mut self.encoder,
            VIDEO_OUTPUT_INDEX,
            self.time_base,
            self.output_time_base,
            octx,
        )
    }
}

struct AudioLane {
    input_index: usize,
    output_index: usize,
    decoder: decoder::Audio,
    encoder: encoder::Audio,
    graph: filter::Graph,
    /// `1/sample_rate`, shared by decoder, filter and encoder.
    time_base: Rational,
    output_time_base: Rational,
}

impl AudioLane {
    fn open(
        ist: &format::stream::Stream<'_>,
        output_index: usize,
        octx: &mut Output,
        encoder_name: &str,
    ) -> PlateblurResult<Self> {
        let input_index = ist.index();
        let decoder = codec::context::Context::from_parameters(ist.parameters())
            .and_then(|ctx| ctx.decoder().audio())
            .map_err(|e| PlateblurError::decode(format!("failed to open audio decoder: {e}")))?;
        let rate = decoder.rate();
        if rate == 0 {
            return Err(PlateblurError::unsupported_stream(format!(
                "audio stream {input_index} has no sample rate"
            )));
        }
        let time_base = Rational::new(1, rate as i32);

        let audio_codec = encoder::find_by_name(encoder_name)
            .ok_or_else(|| PlateblurError::encode(format!("audio encoder not available: {encoder_name}")))?
            .audio()
            .map_err(|e| PlateblurError::encode(format!("{encoder_name} is not an audio encoder: {e}")))?;
        let global_header = octx
            .format()
            .flags()
            .contains(format::flag::Flags::GLOBAL_HEADER);

        let mut ost = octx
            .add_stream(*audio_codec)
            .map_err(|e| PlateblurError::mux(format!("failed to add audio stream: {e}")))?;
        let mut encoder = codec::context::Context::new_with_codec(*audio_codec)
            .encoder()
            .audio()
            .map_err(|e| PlateblurError::encode(format!("failed to create audio encoder: {e}")))?;

        let channels = decoder.ch_layout().channels();
        let layout = audio_codec
            .ch_layouts()
            .map(|layouts| layouts.best(channels))
            .unwrap_or_else(|| ffmpeg::ChannelLayout::default_for_channels(channels));
        let sample_format = audio_codec
            .formats()
            .and_then(|mut formats| formats.next())
            .ok_or_else(|| PlateblurError::encode(format!("{encoder_name} reports no sample formats")))?;
        let bit_rate = match decoder.bit_rate() {
            0 => FALLBACK_AUDIO_BIT_RATE,
            n => n,
        };

        if global_header {
            encoder.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }
        encoder.set_rate(rate as i32);
        encoder.set_ch_layout(layout);
        encoder.set_format(sample_format);
        encoder.set_bit_rate(bit_rate);
        encoder.set_time_base(time_base);

        let encoder = encoder
            .open_as(*audio_codec)
            .map_err(|e| PlateblurError::encode(format!("failed to open {encoder_name}: {e}")))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        ost.set_metadata(ist.metadata().to_owned());

        let graph = build_resampler(&decoder, &encoder, audio_codec.capabilities())?;

        tracing::debug!(
            input_stream = input_index,
            output_stream = output_index,
            rate,
            channels,
            encoder = encoder_name,
            "Audio lane opened"
        );

        Ok(Self {
            input_index,
            output_index,
            decoder,
            encoder,
            graph,
            time_base,
            output_time_base: time_base,
        })
    }

    fn send_packet(&mut self, packet: &Packet) -> PlateblurResult<()> {
        self.decoder.send_packet(packet).map_err(|e| {
            PlateblurError::decode(format!("audio decode failed on stream {}: {e}", self.input_index))
        })
    }

    fn filter_context(&mut self, name: &str) -> PlateblurResult<filter::Context<'_>> {
        self.graph
            .get(name)
            .ok_or_else(|| PlateblurError::encode(format!("audio filter graph has no {name} pad")))
    }

    fn receive_frames(&mut self, octx: &mut Output) -> PlateblurResult<()> {
        let mut decoded = frame::Audio::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {}
                Err(e) if is_drained(&e) => return Ok(()),
                Err(e) => {
                    return Err(PlateblurError::decode(format!(
                        "audio decode failed on stream {}: {e}",
                        self.input_index
                    )))
                }
            }
            let timestamp = decoded.timestamp();
            decoded.set_pts(timestamp);
            self.filter_context("in")?
                .source()
                .add(&decoded)
                .map_err(|e| PlateblurError::encode(format!("failed to feed audio filter: {e}")))?;
            self.drain_filter(octx)?;
        }
    }

    fn drain_filter(&mut self, octx: &mut Output) -> PlateblurResult<()> {
        let mut filtered = frame::Audio::empty();
        loop {
            match self.filter_context("out")?.sink().frame(&mut filtered) {
                Ok(()) => {}
                Err(e) if is_drained(&e) => return Ok(()),
                Err(e) => {
                    return Err(PlateblurError::encode(format!(
                        "failed to pull from audio filter: {e}"
                    )))
                }
            }
            self.encoder
                .send_frame(&filtered)
                .map_err(|e| PlateblurError::encode(format!("audio encode failed: {e}")))?;
            drain_encoder(
                &mut self.encoder,
                self.output_index,
                self.time_base,
                self.output_time_base,
                octx,
            )?;
        }
    }

    fn flush(&mut self, octx: &mut Output) -> PlateblurResult<()> {
        self.decoder
            .send_eof()
            .map_err(|e| PlateblurError::decode(format!("failed to flush audio decoder: {e}")))?;
        self.receive_frames(octx)?;
        self.filter_context("in")?
            .source()
            .flush()
            .map_err(|e| PlateblurError::encode(format!("failed to flush audio filter: {e}")))?;
        self.drain_filter(octx)?;
        self.encoder
            .send_eof()
            .map_err(|e| PlateblurError::encode(format!("failed to flush audio encoder: {e}")))?;
        drain_encoder(
            &mut self.encoder,
            self.output_index,
            self.time_base,
            self.output_time_base,
            octx,
        )
    }
}

/// `abuffer -> aformat -> abuffersink`, converting decoded samples to what
/// the encoder accepts and regrouping them into encoder-sized frames.
fn build_resampler(
    decoder: &decoder::Audio,
    encoder: &encoder::Audio,
    capabilities: Capabilities,
) -> PlateblurResult<filter::Graph> {
    let graph_error = |e: ffmpeg::Error| PlateblurError::encode(format!("audio filter graph: {e}"));
    let missing = |name: &str| PlateblurError::encode(format!("FFmpeg filter {name} not available"));

    let rate = decoder.rate();
    let mut graph = filter::Graph::new();
    let source_args = format!(
        "time_base=1/{rate}:sample_rate={rate}:sample_fmt={}:channel_layout={}",
        decoder.format().name(),
        decoder.ch_layout().description(),
    );
    let abuffer = filter::find("abuffer").ok_or_else(|| missing("abuffer"))?;
    let abuffersink = filter::find("abuffersink").ok_or_else(|| missing("abuffersink"))?;
    graph.add(&abuffer, "in", &source_args).map_err(graph_error)?;
    graph.add(&abuffersink, "out", "").map_err(graph_error)?;

    let convert = format!(
        "aformat=sample_fmts={}:sample_rates={}:channel_layouts={}",
        encoder.format().name(),
        encoder.rate(),
        encoder.ch_layout().description(),
    );
    graph
        .output("in", 0)
        .and_then(|parser| parser.input("out", 0))
        .and_then(|parser| parser.parse(&convert))
        .map_err(graph_error)?;
    graph.validate().map_err(graph_error)?;

    if !capabilities.contains(Capabilities::VARIABLE_FRAME_SIZE) {
        graph
            .get("out")
            .ok_or_else(|| missing("abuffersink"))?
            .sink()
            .set_frame_size(encoder.frame_size());
    }
    Ok(graph)
}

/// Open demuxer, decoders, encoders and muxer for one file.
pub(crate) struct Transcode {
    ictx: Input,
    octx: Output,
    video: VideoLane,
    audio: Vec<AudioLane>,
    total_frames: Option<u64>,
}

impl Transcode {
    pub(crate) fn open(
        input: &Path,
        write_path: &Path,
        video_encoder: &str,
        audio_encoder: &str,
    ) -> PlateblurResult<Self> {
        let ictx = format::input(&input)
            .map_err(|e| PlateblurError::container_open(input, e.to_string()))?;
        let mut octx = format::output(&write_path)
            .map_err(|e| PlateblurError::container_open(write_path, e.to_string()))?;

        let (mut video, total_frames) = VideoLane::open(&ictx, &mut octx, video_encoder)?;

        let mut audio = Vec::new();
        for ist in ictx.streams() {
            if ist.parameters().medium() != media::Type::Audio {
                continue;
            }
            let output_index = VIDEO_OUTPUT_INDEX + 1 + audio.len();
            audio.push(AudioLane::open(&ist, output_index, &mut octx, audio_encoder)?);
        }

        octx.set_metadata(ictx.metadata().to_owned());
        octx.write_header()
            .map_err(|e| PlateblurError::mux(format!("failed to write header: {e}")))?;

        // The muxer may pick its own stream time bases while writing the header.
        video.output_time_base = stream_time_base(&octx, VIDEO_OUTPUT_INDEX)?;
        for lane in &mut audio {
            lane.output_time_base = stream_time_base(&octx, lane.output_index)?;
        }

        Ok(Self {
            ictx,
            octx,
            video,
            audio,
            total_frames,
        })
    }

    pub(crate) fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    pub(crate) fn audio_streams(&self) -> usize {
        self.audio.len()
    }

    /// Demux and process every packet in arrival order.
    pub(crate) fn stream(
        &mut self,
        scheduler: &mut FrameScheduler<'_>,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> PlateblurResult<()> {
        let video_index = self.video.input_index;
        for (stream, mut packet) in self.ictx.packets() {
            if cancel.is_cancelled() {
                return Err(PlateblurError::Cancelled);
            }
            let index = stream.index();
            if index == video_index {
                self.video.send_packet(&packet)?;
                self.video
                    .receive_frames(scheduler, &mut self.octx, reporter, cancel)?;
            } else if let Some(lane) = self.audio.iter_mut().find(|l| l.input_index == index) {
                packet.rescale_ts(stream.time_base(), lane.time_base);
                lane.send_packet(&packet)?;
                lane.receive_frames(&mut self.octx)?;
            }
        }
        Ok(())
    }

    /// Drain every lane, then write the trailer. Returns the number of video
    /// frames processed.
    ///
    /// All lanes are flushed even when one fails; the first failure wins.
    pub(crate) fn finish(
        mut self,
        scheduler: &mut FrameScheduler<'_>,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> PlateblurResult<u64> {
        let mut first_error = self
            .video
            .flush(scheduler, &mut self.octx, reporter, cancel)
            .err();
        for lane in &mut self.audio {
            if let Err(e) = lane.flush(&mut self.octx) {
                tracing::warn!(stream = lane.output_index, error = %e, "Audio flush failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        self.octx
            .write_trailer()
            .map_err(|e| PlateblurError::mux(format!("failed to write trailer: {e}")))?;
        Ok(self.video.frames)
    }
}

fn stream_time_base(octx: &Output, index: usize) -> PlateblurResult<Rational> {
    octx.stream(index)
        .map(|s| s.time_base())
        .ok_or_else(|| PlateblurError::mux(format!("output stream {index} missing after header")))
}
