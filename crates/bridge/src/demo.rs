use vizwire_protocol::{PlotScalarData, Recording, ThreeDViewData, Viz, Widget};

/// A small recording with one of each widget: a sine plot and a 10 second
/// spiral animation at 10 frames per second.
pub fn demo_recording() -> Recording {
    let mut recording = Recording::new("Demo", "demo");
    recording.add_viz(sine_plot());
    recording.add_viz(spiral());
    recording
}

fn sine_plot() -> Viz {
    let mut data = PlotScalarData::default();
    for i in 0..100 {
        let x = f64::from(i) / 20.0;
        data.push(x, (x * 10.0).sin());
    }
    let mut viz = Viz::new("Sine").with_widget(Widget::ScalarPlot(data));
    viz.set_source("demo");
    viz
}

fn spiral() -> Viz {
    let mut view = ThreeDViewData::default();
    for step in 0..100 {
        let t = f64::from(step) * 0.1;
        let points = (0..50)
            .map(|i| {
                let i = f64::from(i);
                let angle = i * 0.2 + t;
                let radius = i * 0.1 + t * 0.5;
                (angle.cos() * radius, angle.sin() * radius, i * 0.1 + t.sin())
            })
            .collect();
        view.push_points(t, points);
    }
    let mut viz = Viz::new("Spiral").with_widget(Widget::ThreeDView(view));
    viz.set_source("demo");
    viz
}
